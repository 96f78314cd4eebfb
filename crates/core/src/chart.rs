use crate::domain::series::PriceSeries;
use crate::indicators::IndicatorSet;
use chrono::NaiveDate;
use serde::Serialize;

/// One row per bar: candle, volume and the indicators overlaid on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub rsi14: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub symbol: String,
    pub points: Vec<ChartPoint>,
    /// Horizontal guides drawn on the RSI panel.
    pub rsi_levels: RsiLevels,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RsiLevels {
    pub overbought: f64,
    pub oversold: f64,
}

pub fn chart_points(series: &PriceSeries, indicators: &IndicatorSet) -> Vec<ChartPoint> {
    series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| ChartPoint {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ma20: indicators.ma20.get(i).copied().flatten(),
            ma50: indicators.ma50.get(i).copied().flatten(),
            rsi14: indicators.rsi14.get(i).copied().flatten(),
        })
        .collect()
}
