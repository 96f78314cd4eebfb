use crate::format;
use serde::{Deserialize, Serialize};

/// Company facts from the metadata endpoint. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyMetrics {
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetric {
    pub label: &'static str,
    pub value: String,
    pub explanation: &'static str,
}

impl CompanyMetrics {
    pub fn sector_or_na(&self) -> &str {
        self.sector.as_deref().unwrap_or(format::NOT_AVAILABLE)
    }

    pub fn industry_or_na(&self) -> &str {
        self.industry.as_deref().unwrap_or(format::NOT_AVAILABLE)
    }

    pub fn market_cap_display(&self) -> String {
        format::or_na(self.market_cap, format::whole_currency)
    }

    pub fn trailing_pe_display(&self) -> String {
        format::or_na(self.trailing_pe, format::decimal)
    }

    pub fn beta_display(&self) -> String {
        format::or_na(self.beta, format::decimal)
    }

    /// The metric cards shown next to a quote, in display order.
    pub fn key_metrics(&self) -> Vec<KeyMetric> {
        vec![
            KeyMetric {
                label: "Market Cap",
                value: self.market_cap_display(),
                explanation: "Total value of a company's shares. Higher market cap typically indicates a more stable company.",
            },
            KeyMetric {
                label: "P/E Ratio",
                value: self.trailing_pe_display(),
                explanation: "Price-to-Earnings ratio compares stock price to earnings per share. Lower P/E might indicate an undervalued stock.",
            },
            KeyMetric {
                label: "Forward P/E",
                value: format::or_na(self.forward_pe, format::decimal),
                explanation: "P/E ratio using projected earnings. Helps assess future growth expectations.",
            },
            KeyMetric {
                label: "Dividend Yield",
                value: format::or_na(self.dividend_yield, format::percent),
                explanation: "Annual dividend payments relative to stock price. Higher yield means better income potential.",
            },
            KeyMetric {
                label: "Beta",
                value: self.beta_display(),
                explanation: "Measure of stock's volatility compared to the market. Beta > 1 means more volatile than market.",
            },
            KeyMetric {
                label: "52 Week High",
                value: format::or_na(self.fifty_two_week_high, format::decimal),
                explanation: "Highest price in the past year. Helps understand price range and momentum.",
            },
            KeyMetric {
                label: "52 Week Low",
                value: format::or_na(self.fifty_two_week_low, format::decimal),
                explanation: "Lowest price in the past year. Helps understand price range and support levels.",
            },
        ]
    }
}
