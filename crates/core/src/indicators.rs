//! Rolling indicators over a daily price series.
//!
//! Every per-date vector is aligned with the input bars: index `i` describes bar `i`, and
//! `None` marks dates whose trailing window is not yet full.

use crate::domain::series::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of bars the engine accepts.
pub const MIN_BARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_period: usize,
    pub volume_window: usize,
    pub trading_days_per_year: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 50,
            rsi_period: 14,
            volume_window: 20,
            trading_days_per_year: 252.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub dates: Vec<NaiveDate>,
    pub ma20: Vec<Option<f64>>,
    pub ma50: Vec<Option<f64>>,
    pub rsi14: Vec<Option<f64>>,
    pub avg_volume20: Vec<Option<f64>>,
    /// Annualized, over the whole series.
    pub volatility: Option<f64>,
}

/// Latest values needed by the recommendation rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub previous_close: Option<f64>,
    pub volume: f64,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub rsi14: Option<f64>,
    pub avg_volume20: Option<f64>,
    pub volatility: Option<f64>,
}

pub fn compute_indicators(
    series: &PriceSeries,
    config: &IndicatorConfig,
) -> Result<IndicatorSet, IndicatorError> {
    if series.len() < MIN_BARS {
        return Err(IndicatorError::InsufficientData {
            required: MIN_BARS,
            actual: series.len(),
        });
    }

    let closes = series.closes();
    let volumes = series.volumes();

    let set = IndicatorSet {
        dates: series.dates(),
        ma20: rolling_mean(&closes, config.short_window),
        ma50: rolling_mean(&closes, config.long_window),
        rsi14: rsi(&closes, config.rsi_period),
        avg_volume20: rolling_mean(&volumes, config.volume_window),
        volatility: annualized_volatility(&closes, config.trading_days_per_year),
    };

    tracing::debug!(
        bars = series.len(),
        volatility = ?set.volatility,
        "computed indicators"
    );

    Ok(set)
}

impl IndicatorSet {
    /// Reads the latest values off the tail of `series`, which must be the series these
    /// indicators were computed from.
    pub fn snapshot(&self, series: &PriceSeries) -> Option<IndicatorSnapshot> {
        let last = series.last()?;
        if self.dates.last() != Some(&last.date) {
            return None;
        }

        Some(IndicatorSnapshot {
            date: last.date,
            close: last.close,
            previous_close: series.previous_close(),
            volume: last.volume,
            ma20: self.ma20.last().copied().flatten(),
            ma50: self.ma50.last().copied().flatten(),
            rsi14: self.rsi14.last().copied().flatten(),
            avg_volume20: self.avg_volume20.last().copied().flatten(),
            volatility: self.volatility,
        })
    }
}

/// Simple mean over the trailing `window` values, inclusive of the current one.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; data.len()];
    }

    (0..data.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let sum: f64 = data[i + 1 - window..=i].iter().sum();
            Some(sum / window as f64)
        })
        .collect()
}

/// RSI with simple rolling averages of gains and losses. A window with no losses is 100.
///
/// The first bar has no delta and counts as a zero gain and zero loss, so the first value
/// lands at index `period - 1`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for t in 1..closes.len() {
        let delta = closes[t] - closes[t - 1];
        gains[t] = delta.max(0.0);
        losses[t] = (-delta).max(0.0);
    }

    for t in period - 1..closes.len() {
        let window = t + 1 - period..=t;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;

        out[t] = Some(if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        });
    }

    out
}

/// Sample standard deviation of day-over-day returns, scaled by `sqrt(trading_days)`.
pub fn annualized_volatility(closes: &[f64], trading_days: f64) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * trading_days.sqrt())
}
