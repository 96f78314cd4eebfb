use crate::domain::recommendation::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub symbol: String,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub current_price: f64,
    pub previous_close: f64,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedHolding {
    pub symbol: String,
    pub shares: f64,
    pub current_price: f64,
    pub total_value: f64,
    pub daily_change_pct: f64,
    pub sector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub weighted_daily_change_pct: f64,
    /// Sector name to share of total value, in percent.
    pub sector_distribution_pct: BTreeMap<String, f64>,
    pub risk_level: RiskLevel,
    pub holdings: Vec<ValuedHolding>,
}
