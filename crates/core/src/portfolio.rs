use crate::domain::portfolio::{PortfolioHolding, PortfolioSummary, Quote, ValuedHolding};
use crate::domain::recommendation::RiskLevel;
use crate::report::normalize_symbol;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

pub const UNKNOWN_SECTOR: &str = "Unknown";

pub const SAMPLE_PORTFOLIO_CSV: &str = "Symbol,Shares\nAAPL,10\nGOOGL,5\nMSFT,15\n";

#[async_trait::async_trait]
pub trait QuoteLookup: Send + Sync {
    async fn lookup(&self, symbol: &str) -> anyhow::Result<Quote>;
}

/// How each holding's daily change is weighted into the portfolio figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMode {
    /// Weight by value over the running total so far, including the current holding.
    /// Result depends on holding order.
    #[default]
    RunningTotal,
    /// Weight by value over the final portfolio total.
    FinalTotal,
}

impl FromStr for WeightingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" | "running_total" => Ok(Self::RunningTotal),
            "final" | "final_total" => Ok(Self::FinalTotal),
            other => anyhow::bail!("unknown portfolio weighting mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRules {
    /// Fewer distinct sectors than this is high risk.
    pub high_risk_below_sectors: usize,
    /// More distinct sectors than this is low risk.
    pub low_risk_above_sectors: usize,
    pub weighting: WeightingMode,
}

impl Default for PortfolioRules {
    fn default() -> Self {
        Self {
            high_risk_below_sectors: 3,
            low_risk_above_sectors: 5,
            weighting: WeightingMode::RunningTotal,
        }
    }
}

#[derive(Debug, Error)]
pub enum PortfolioAggregationError {
    #[error("quote lookup failed for {symbol}: {source}")]
    Lookup {
        symbol: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid quote for {symbol}: {reason}")]
    InvalidQuote { symbol: String, reason: String },
}

impl PortfolioAggregationError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Lookup { symbol, .. } | Self::InvalidQuote { symbol, .. } => symbol,
        }
    }
}

pub fn risk_for_sector_count(count: usize, rules: &PortfolioRules) -> RiskLevel {
    if count < rules.high_risk_below_sectors {
        RiskLevel::High
    } else if count > rules.low_risk_above_sectors {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    }
}

/// Values every holding with one lookup each, sequentially and in input order. Any lookup
/// failure aborts the whole aggregation.
pub async fn aggregate(
    holdings: &[PortfolioHolding],
    lookup: &dyn QuoteLookup,
    rules: &PortfolioRules,
) -> Result<PortfolioSummary, PortfolioAggregationError> {
    let mut valued = Vec::with_capacity(holdings.len());
    for holding in holdings {
        let quote = lookup.lookup(&holding.symbol).await.map_err(|err| {
            tracing::warn!(symbol = %holding.symbol, error = %err, "portfolio quote lookup failed");
            PortfolioAggregationError::Lookup {
                symbol: holding.symbol.clone(),
                source: err.into(),
            }
        })?;
        valued.push(value_holding(holding, quote)?);
    }

    let summary = summarize(valued, rules);
    tracing::info!(
        holdings = summary.holdings.len(),
        sectors = summary.sector_distribution_pct.len(),
        total_value = summary.total_value,
        "aggregated portfolio"
    );
    Ok(summary)
}

fn value_holding(
    holding: &PortfolioHolding,
    quote: Quote,
) -> Result<ValuedHolding, PortfolioAggregationError> {
    let invalid = |reason: &str| PortfolioAggregationError::InvalidQuote {
        symbol: holding.symbol.clone(),
        reason: reason.to_string(),
    };

    if !quote.current_price.is_finite() || quote.current_price < 0.0 {
        return Err(invalid("current price must be a non-negative number"));
    }
    if !quote.previous_close.is_finite() || quote.previous_close <= 0.0 {
        return Err(invalid("previous close must be a positive number"));
    }

    let total_value = quote.current_price * holding.shares;
    let daily_change_pct =
        (quote.current_price - quote.previous_close) / quote.previous_close * 100.0;
    let sector = quote
        .sector
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_SECTOR.to_string());

    Ok(ValuedHolding {
        symbol: holding.symbol.clone(),
        shares: holding.shares,
        current_price: quote.current_price,
        total_value,
        daily_change_pct,
        sector,
    })
}

fn summarize(holdings: Vec<ValuedHolding>, rules: &PortfolioRules) -> PortfolioSummary {
    let mut total_value = 0.0;
    let mut running_change = 0.0;
    let mut sectors: BTreeMap<String, f64> = BTreeMap::new();

    for h in &holdings {
        total_value += h.total_value;
        if total_value != 0.0 {
            running_change += h.daily_change_pct * (h.total_value / total_value);
        }
        *sectors.entry(h.sector.clone()).or_insert(0.0) += h.total_value;
    }

    let weighted_daily_change_pct = match rules.weighting {
        WeightingMode::RunningTotal => running_change,
        WeightingMode::FinalTotal if total_value != 0.0 => holdings
            .iter()
            .map(|h| h.daily_change_pct * h.total_value / total_value)
            .sum(),
        WeightingMode::FinalTotal => 0.0,
    };

    for value in sectors.values_mut() {
        *value = if total_value != 0.0 {
            *value / total_value * 100.0
        } else {
            0.0
        };
    }

    PortfolioSummary {
        total_value,
        weighted_daily_change_pct,
        risk_level: risk_for_sector_count(sectors.len(), rules),
        sector_distribution_pct: sectors,
        holdings,
    }
}

/// Reads `Symbol` and `Shares` columns (any order, case-insensitive headers).
pub fn parse_holdings_csv(text: &str) -> anyhow::Result<Vec<PortfolioHolding>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(symbol_idx), Some(shares_idx)) = (column("Symbol"), column("Shares")) else {
        anyhow::bail!("CSV must contain 'Symbol' and 'Shares' columns");
    };

    let mut out = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let record = record.with_context(|| format!("malformed CSV record at line {line}"))?;

        let raw_symbol = record.get(symbol_idx).unwrap_or("").trim();
        if raw_symbol.is_empty() {
            continue;
        }
        let symbol = normalize_symbol(raw_symbol)
            .with_context(|| format!("invalid symbol at line {line}"))?;

        let raw_shares = record.get(shares_idx).unwrap_or("").trim();
        let shares: f64 = raw_shares
            .parse()
            .with_context(|| format!("invalid share count {raw_shares:?} for {symbol} at line {line}"))?;
        anyhow::ensure!(
            shares.is_finite() && shares >= 0.0,
            "share count for {symbol} at line {line} must be a non-negative number (got {raw_shares})"
        );

        out.push(PortfolioHolding { symbol, shares });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeQuotes {
        quotes: HashMap<&'static str, Quote>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeQuotes {
        fn new(entries: &[(&'static str, f64, f64, Option<&str>)]) -> Self {
            let quotes = entries
                .iter()
                .map(|(symbol, price, prev, sector)| {
                    (
                        *symbol,
                        Quote {
                            current_price: *price,
                            previous_close: *prev,
                            sector: sector.map(str::to_string),
                        },
                    )
                })
                .collect();
            Self {
                quotes,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl QuoteLookup for FakeQuotes {
        async fn lookup(&self, symbol: &str) -> anyhow::Result<Quote> {
            self.calls.lock().unwrap().push(symbol.to_string());
            self.quotes
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no quote for {symbol}"))
        }
    }

    fn holding(symbol: &str, shares: f64) -> PortfolioHolding {
        PortfolioHolding {
            symbol: symbol.to_string(),
            shares,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn two_sector_portfolio() {
        let quotes = FakeQuotes::new(&[
            ("AAPL", 150.0, 145.0, Some("Tech")),
            ("XOM", 100.0, 102.0, Some("Energy")),
        ]);
        let holdings = [holding("AAPL", 10.0), holding("XOM", 5.0)];

        let summary = aggregate(&holdings, &quotes, &PortfolioRules::default())
            .await
            .unwrap();

        assert!(approx(summary.total_value, 2000.0));
        assert!(approx(summary.sector_distribution_pct["Tech"], 75.0));
        assert!(approx(summary.sector_distribution_pct["Energy"], 25.0));
        assert_eq!(summary.risk_level, RiskLevel::High);
        assert_eq!(summary.holdings.len(), 2);
        assert_eq!(summary.holdings[0].symbol, "AAPL");
        assert!(approx(summary.holdings[0].total_value, 1500.0));
        assert!(approx(summary.holdings[1].daily_change_pct, -200.0 / 102.0));
    }

    #[tokio::test]
    async fn running_total_weighting_depends_on_holding_order() {
        let quotes = FakeQuotes::new(&[
            ("AAPL", 150.0, 145.0, Some("Tech")),
            ("XOM", 100.0, 102.0, Some("Energy")),
        ]);
        let aapl_change = 5.0 / 145.0 * 100.0;
        let xom_change = -2.0 / 102.0 * 100.0;

        let forward = aggregate(
            &[holding("AAPL", 10.0), holding("XOM", 5.0)],
            &quotes,
            &PortfolioRules::default(),
        )
        .await
        .unwrap();
        // 1500/1500 then 500/2000
        assert!(approx(
            forward.weighted_daily_change_pct,
            aapl_change + xom_change * 0.25
        ));

        let reversed = aggregate(
            &[holding("XOM", 5.0), holding("AAPL", 10.0)],
            &quotes,
            &PortfolioRules::default(),
        )
        .await
        .unwrap();
        // 500/500 then 1500/2000
        assert!(approx(
            reversed.weighted_daily_change_pct,
            xom_change + aapl_change * 0.75
        ));
    }

    #[tokio::test]
    async fn final_total_weighting_is_order_independent() {
        let quotes = FakeQuotes::new(&[
            ("AAPL", 150.0, 145.0, Some("Tech")),
            ("XOM", 100.0, 102.0, Some("Energy")),
        ]);
        let rules = PortfolioRules {
            weighting: WeightingMode::FinalTotal,
            ..Default::default()
        };
        let expected = (5.0 / 145.0 * 100.0) * 0.75 + (-2.0 / 102.0 * 100.0) * 0.25;

        let a = aggregate(&[holding("AAPL", 10.0), holding("XOM", 5.0)], &quotes, &rules)
            .await
            .unwrap();
        let b = aggregate(&[holding("XOM", 5.0), holding("AAPL", 10.0)], &quotes, &rules)
            .await
            .unwrap();
        assert!(approx(a.weighted_daily_change_pct, expected));
        assert!(approx(b.weighted_daily_change_pct, expected));
    }

    #[tokio::test]
    async fn lookup_failure_aborts_and_names_symbol() {
        let quotes = FakeQuotes::new(&[
            ("AAPL", 150.0, 145.0, Some("Tech")),
            ("MSFT", 400.0, 390.0, Some("Tech")),
        ]);
        let holdings = [holding("AAPL", 1.0), holding("NOPE", 1.0), holding("MSFT", 1.0)];

        let err = aggregate(&holdings, &quotes, &PortfolioRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PortfolioAggregationError::Lookup { .. }));
        assert_eq!(err.symbol(), "NOPE");
        assert!(err.to_string().contains("NOPE"));
        // Lookups are sequential and stop at the failure.
        assert_eq!(*quotes.calls.lock().unwrap(), vec!["AAPL", "NOPE"]);
    }

    #[tokio::test]
    async fn zero_previous_close_is_rejected() {
        let quotes = FakeQuotes::new(&[("AAPL", 150.0, 0.0, Some("Tech"))]);
        let err = aggregate(&[holding("AAPL", 1.0)], &quotes, &PortfolioRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PortfolioAggregationError::InvalidQuote { .. }));
        assert_eq!(err.symbol(), "AAPL");
    }

    #[tokio::test]
    async fn missing_sector_is_unknown_and_diversified_is_low_risk() {
        let quotes = FakeQuotes::new(&[
            ("A", 10.0, 10.0, Some("Tech")),
            ("B", 10.0, 10.0, Some("Energy")),
            ("C", 10.0, 10.0, Some("Health")),
            ("D", 10.0, 10.0, Some("Utilities")),
            ("E", 10.0, 10.0, Some("Financials")),
            ("F", 10.0, 10.0, None),
        ]);
        let holdings: Vec<_> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|s| holding(s, 1.0))
            .collect();

        let summary = aggregate(&holdings, &quotes, &PortfolioRules::default())
            .await
            .unwrap();
        assert_eq!(summary.sector_distribution_pct.len(), 6);
        assert!(summary.sector_distribution_pct.contains_key(UNKNOWN_SECTOR));
        assert_eq!(summary.risk_level, RiskLevel::Low);
        let total_pct: f64 = summary.sector_distribution_pct.values().sum();
        assert!(approx(total_pct, 100.0));
    }

    #[test]
    fn risk_thresholds() {
        let rules = PortfolioRules::default();
        assert_eq!(risk_for_sector_count(2, &rules), RiskLevel::High);
        assert_eq!(risk_for_sector_count(3, &rules), RiskLevel::Medium);
        assert_eq!(risk_for_sector_count(5, &rules), RiskLevel::Medium);
        assert_eq!(risk_for_sector_count(6, &rules), RiskLevel::Low);
    }

    #[tokio::test]
    async fn empty_portfolio_is_zero_valued() {
        let quotes = FakeQuotes::new(&[]);
        let summary = aggregate(&[], &quotes, &PortfolioRules::default())
            .await
            .unwrap();
        assert_eq!(summary.total_value, 0.0);
        assert!(summary.sector_distribution_pct.is_empty());
        assert_eq!(summary.risk_level, RiskLevel::High);
    }

    #[test]
    fn parses_csv_with_any_column_order() {
        let csv = "Shares,Notes,symbol\n10,core,aapl\n2.5,, msft \n3,,\n";
        let holdings = parse_holdings_csv(csv).unwrap();
        assert_eq!(
            holdings,
            vec![holding("AAPL", 10.0), holding("MSFT", 2.5)]
        );
    }

    #[test]
    fn sample_template_parses() {
        let holdings = parse_holdings_csv(SAMPLE_PORTFOLIO_CSV).unwrap();
        assert_eq!(holdings.len(), 3);
        assert_eq!(holdings[1], holding("GOOGL", 5.0));
    }

    #[test]
    fn csv_requires_both_columns() {
        let err = parse_holdings_csv("Ticker,Shares\nAAPL,1\n").unwrap_err();
        assert!(err.to_string().contains("'Symbol' and 'Shares'"));
    }

    #[test]
    fn csv_rejects_bad_share_counts() {
        let err = parse_holdings_csv("Symbol,Shares\nAAPL,ten\n").unwrap_err();
        assert!(format!("{err:#}").contains("AAPL at line 2"));
        assert!(parse_holdings_csv("Symbol,Shares\nAAPL,-1\n").is_err());
    }

    #[test]
    fn csv_rejects_symbols_that_are_not_tickers() {
        let err = parse_holdings_csv("Symbol,Shares\nAAPL?range=max#,1\n").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("invalid symbol at line 2"));
        assert!(msg.contains("AAPL?range=max#"));

        let err = parse_holdings_csv("Symbol,Shares\nMSFT,1\n../v10/x,2\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));

        let ok = parse_holdings_csv("Symbol,Shares\nbrk-b,1\n^gspc,2\n").unwrap();
        assert_eq!(ok, vec![holding("BRK-B", 1.0), holding("^GSPC", 2.0)]);
    }

    #[test]
    fn weighting_mode_parses_env_values() {
        assert_eq!("running".parse::<WeightingMode>().unwrap(), WeightingMode::RunningTotal);
        assert_eq!("FINAL".parse::<WeightingMode>().unwrap(), WeightingMode::FinalTotal);
        assert!("median".parse::<WeightingMode>().is_err());
    }
}
