use crate::domain::metrics::CompanyMetrics;
use crate::domain::recommendation::{Recommendation, RiskLevel, Verdict};
use crate::domain::series::PriceSeries;
use crate::format;
use crate::indicators::{
    compute_indicators, IndicatorConfig, IndicatorError, IndicatorSet, IndicatorSnapshot,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRules {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_high_ratio: f64,
    pub volume_low_ratio: f64,
}

impl Default for DecisionRules {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_high_ratio: 1.2,
            volume_low_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    High,
    Low,
    Normal,
}

/// Boolean inputs to the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub price_above_ma50: bool,
    pub price_above_ma20: bool,
    pub rsi_oversold: bool,
    pub rsi_overbought: bool,
    pub volume_high: bool,
    pub volume_low: bool,
}

/// Either a computed recommendation or the fixed fallback, tagged with why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    Computed {
        signals: Signals,
        recommendation: Recommendation,
    },
    InsufficientData {
        reason: String,
        fallback: Recommendation,
    },
}

impl RecommendationOutcome {
    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
            fallback: Recommendation::unavailable(),
        }
    }

    pub fn recommendation(&self) -> &Recommendation {
        match self {
            Self::Computed { recommendation, .. } => recommendation,
            Self::InsufficientData { fallback, .. } => fallback,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed { .. })
    }
}

/// The indicator values the table needs, all present and finite.
#[derive(Debug, Clone, Copy)]
struct Inputs {
    close: f64,
    volume: f64,
    ma20: f64,
    ma50: f64,
    rsi: f64,
    avg_volume: f64,
    volatility: f64,
}

impl Inputs {
    fn from_snapshot(s: &IndicatorSnapshot) -> Result<Self, String> {
        fn require(name: &str, v: Option<f64>) -> Result<f64, String> {
            match v {
                Some(v) if v.is_finite() => Ok(v),
                Some(_) => Err(format!("{name} is not a finite number")),
                None => Err(format!("{name} is not available")),
            }
        }

        Ok(Self {
            close: require("close", Some(s.close))?,
            volume: require("volume", Some(s.volume))?,
            ma20: require("ma20", s.ma20)?,
            ma50: require("ma50", s.ma50)?,
            rsi: require("rsi14", s.rsi14)?,
            avg_volume: require("avg_volume20", s.avg_volume20)?,
            volatility: require("volatility", s.volatility)?,
        })
    }
}

pub fn derive_signals(
    close: f64,
    volume: f64,
    ma20: f64,
    ma50: f64,
    rsi: f64,
    avg_volume: f64,
    rules: &DecisionRules,
) -> Signals {
    Signals {
        price_above_ma50: close > ma50,
        price_above_ma20: close > ma20,
        rsi_oversold: rsi < rules.rsi_oversold,
        rsi_overbought: rsi > rules.rsi_overbought,
        volume_high: volume > avg_volume * rules.volume_high_ratio,
        volume_low: volume < avg_volume * rules.volume_low_ratio,
    }
}

/// First matching row wins.
pub fn decide(signals: &Signals) -> (Verdict, RiskLevel) {
    let s = signals;
    if (s.price_above_ma50 && s.price_above_ma20 && !s.rsi_overbought)
        || (s.rsi_oversold && s.volume_high)
    {
        (Verdict::Buy, RiskLevel::Medium)
    } else if s.rsi_overbought || (!s.price_above_ma50 && !s.price_above_ma20) {
        (Verdict::Sell, RiskLevel::High)
    } else {
        (Verdict::Hold, RiskLevel::Low)
    }
}

pub fn recommend(
    snapshot: &IndicatorSnapshot,
    metrics: &CompanyMetrics,
    rules: &DecisionRules,
) -> RecommendationOutcome {
    let inputs = match Inputs::from_snapshot(snapshot) {
        Ok(inputs) => inputs,
        Err(reason) => {
            tracing::debug!(date = %snapshot.date, %reason, "falling back to default recommendation");
            return RecommendationOutcome::insufficient(reason);
        }
    };

    let signals = derive_signals(
        inputs.close,
        inputs.volume,
        inputs.ma20,
        inputs.ma50,
        inputs.rsi,
        inputs.avg_volume,
        rules,
    );
    let (verdict, risk) = decide(&signals);

    let trend = if signals.price_above_ma50 {
        Trend::Bullish
    } else {
        Trend::Bearish
    };
    let momentum = if signals.price_above_ma20 {
        Momentum::Increasing
    } else {
        Momentum::Decreasing
    };
    let volume_trend = if signals.volume_high {
        VolumeTrend::High
    } else if signals.volume_low {
        VolumeTrend::Low
    } else {
        VolumeTrend::Normal
    };

    let volatility = format::percent(inputs.volatility);
    let rsi_condition = rsi_condition(inputs.rsi, rules);

    let summary = format!(
        "The stock is currently in a {trend} trend with {momentum} momentum. \
         Trading volume is {volume_trend} compared to the 20-day average. \
         Annual volatility is {volatility}."
    );

    let technical_analysis = format!(
        "Price Analysis:\n\
         - Current price ({}) is {trend} relative to the 50-day moving average ({})\n\
         - 20-day moving average: {}\n\
         - RSI at {:.2} indicates {rsi_condition} conditions\n\
         - Volume is {} at {} shares",
        format::currency(inputs.close),
        format::currency(inputs.ma50),
        format::currency(inputs.ma20),
        inputs.rsi,
        volume_trend.upper(),
        format::integer(inputs.volume),
    );

    let fundamental_analysis = format!(
        "Market Metrics:\n\
         - Market Cap: {}\n\
         - P/E Ratio: {}\n\
         - Beta: {}\n\
         \n\
         Sector: {}\n\
         Industry: {}",
        metrics.market_cap_display(),
        metrics.trailing_pe_display(),
        metrics.beta_display(),
        metrics.sector_or_na(),
        metrics.industry_or_na(),
    );

    let reasoning = format!(
        "Recommendation based on:\n\
         - Price trend: {}\n\
         - RSI: {:.2}\n\
         - Volume: {}\n\
         - Volatility: {volatility}",
        trend.upper(),
        inputs.rsi,
        volume_trend.upper(),
    );

    RecommendationOutcome::Computed {
        signals,
        recommendation: Recommendation {
            summary,
            technical_analysis,
            fundamental_analysis,
            recommendation: verdict,
            risk_level: risk,
            reasoning,
        },
    }
}

/// Computes indicators and runs the rules over them.
pub fn analyze_series(
    series: &PriceSeries,
    metrics: &CompanyMetrics,
    config: &IndicatorConfig,
    rules: &DecisionRules,
) -> RecommendationOutcome {
    let indicators = compute_indicators(series, config);
    analyze_indicators(series, indicators.as_ref(), metrics, rules)
}

/// Runs the rules over already computed indicators. Every indicator failure maps to the
/// insufficient-data fallback.
pub fn analyze_indicators(
    series: &PriceSeries,
    indicators: Result<&IndicatorSet, &IndicatorError>,
    metrics: &CompanyMetrics,
    rules: &DecisionRules,
) -> RecommendationOutcome {
    let set = match indicators {
        Ok(set) => set,
        Err(err) => return RecommendationOutcome::insufficient(err.to_string()),
    };

    match set.snapshot(series) {
        Some(snapshot) => recommend(&snapshot, metrics, rules),
        None => RecommendationOutcome::insufficient("series has no latest bar"),
    }
}

/// Reduced rule set for when only RSI and the 50-day trend are known.
pub fn basic_recommendation(rsi: f64, trend: Trend, rules: &DecisionRules) -> Recommendation {
    let verdict = if rsi < rules.rsi_oversold && trend == Trend::Bullish {
        Verdict::Buy
    } else if rsi > rules.rsi_overbought && trend == Trend::Bearish {
        Verdict::Sell
    } else {
        Verdict::Hold
    };

    Recommendation {
        summary: "Basic technical analysis based on price trends and RSI indicator.".to_string(),
        technical_analysis: format!(
            "Current price is {trend} relative to 50-day moving average. RSI at {rsi:.2} indicates {} conditions.",
            rsi_condition(rsi, rules)
        ),
        fundamental_analysis: "Fundamental analysis unavailable for the basic rule set.".to_string(),
        recommendation: verdict,
        risk_level: RiskLevel::Medium,
        reasoning: "Based on technical indicators only.".to_string(),
    }
}

fn rsi_condition(rsi: f64, rules: &DecisionRules) -> &'static str {
    if rsi < rules.rsi_oversold {
        "oversold"
    } else if rsi > rules.rsi_overbought {
        "overbought"
    } else {
        "neutral"
    }
}

impl Trend {
    fn as_str(self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
        }
    }

    fn upper(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl Momentum {
    fn as_str(self) -> &'static str {
        match self {
            Momentum::Increasing => "increasing",
            Momentum::Decreasing => "decreasing",
        }
    }
}

impl VolumeTrend {
    fn as_str(self) -> &'static str {
        match self {
            VolumeTrend::High => "high",
            VolumeTrend::Low => "low",
            VolumeTrend::Normal => "normal",
        }
    }

    fn upper(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Momentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VolumeTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
