use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub summary: String,
    pub technical_analysis: String,
    pub fundamental_analysis: String,
    pub recommendation: Verdict,
    pub risk_level: RiskLevel,
    pub reasoning: String,
}

impl Recommendation {
    /// Fixed value returned when the inputs cannot support an analysis.
    pub fn unavailable() -> Self {
        Self {
            summary: "Technical analysis based on price trends and indicators.".to_string(),
            technical_analysis: "Analysis temporarily unavailable.".to_string(),
            fundamental_analysis: "Analysis temporarily unavailable.".to_string(),
            recommendation: Verdict::Hold,
            risk_level: RiskLevel::Medium,
            reasoning: "Insufficient data for detailed analysis.".to_string(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Buy => "Buy",
            Verdict::Hold => "Hold",
            Verdict::Sell => "Sell",
        };
        f.write_str(s)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(s)
    }
}
