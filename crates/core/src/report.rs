//! One symbol's dashboard payload: quote header, metric cards, chart rows, headlines and
//! the rule-based recommendation.

use crate::analysis::{analyze_indicators, DecisionRules, RecommendationOutcome};
use crate::chart::{chart_points, ChartData, RsiLevels};
use crate::domain::metrics::{CompanyMetrics, KeyMetric};
use crate::domain::news::{NewsItem, DEFAULT_NEWS_LIMIT};
use crate::domain::series::PriceSeries;
use crate::indicators::{compute_indicators, IndicatorConfig};
use crate::market::{MarketDataProvider, Period};
use anyhow::Context;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisSettings {
    pub indicators: IndicatorConfig,
    pub rules: DecisionRules,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockReport {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub period: Period,
    pub current_price: f64,
    pub change_pct: Option<f64>,
    pub key_metrics: Vec<KeyMetric>,
    pub news: Vec<NewsItem>,
    pub outcome: RecommendationOutcome,
}

pub fn build_report(
    symbol: &str,
    period: Period,
    series: &PriceSeries,
    metrics: &CompanyMetrics,
    news: Vec<NewsItem>,
    settings: &AnalysisSettings,
) -> anyhow::Result<(StockReport, ChartData)> {
    let last = series
        .last()
        .with_context(|| format!("no data found for {symbol}"))?;

    let change_pct = series
        .previous_close()
        .filter(|prev| *prev != 0.0)
        .map(|prev| (last.close - prev) / prev * 100.0);

    let indicators = compute_indicators(series, &settings.indicators);
    if let Err(err) = &indicators {
        tracing::info!(%symbol, error = %err, "not enough history for indicators");
    }
    let outcome = analyze_indicators(series, indicators.as_ref(), metrics, &settings.rules);
    let points = indicators
        .as_ref()
        .map(|set| chart_points(series, set))
        .unwrap_or_default();

    let report = StockReport {
        symbol: symbol.to_string(),
        name: metrics.long_name.clone().unwrap_or_else(|| symbol.to_string()),
        sector: metrics.sector.clone(),
        industry: metrics.industry.clone(),
        period,
        current_price: last.close,
        change_pct,
        key_metrics: metrics.key_metrics(),
        news,
        outcome,
    };

    let chart = ChartData {
        symbol: symbol.to_string(),
        points,
        rsi_levels: RsiLevels {
            overbought: settings.rules.rsi_overbought,
            oversold: settings.rules.rsi_oversold,
        },
    };

    Ok((report, chart))
}

/// Fetches series, metadata and headlines for `symbol` and builds its report. A news
/// failure leaves the report without headlines.
pub async fn fetch_report(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    period: Period,
    settings: &AnalysisSettings,
) -> anyhow::Result<(StockReport, ChartData)> {
    let symbol = normalize_symbol(symbol)?;
    let series = provider.fetch_series(&symbol, period).await?;
    let metrics = provider.fetch_metadata(&symbol).await?;
    let news = match provider.fetch_news(&symbol, DEFAULT_NEWS_LIMIT).await {
        Ok(news) => news,
        Err(err) => {
            tracing::warn!(%symbol, error = %format!("{err:#}"), "news unavailable");
            Vec::new()
        }
    };
    build_report(&symbol, period, &series, &metrics, news, settings)
}

pub fn normalize_symbol(raw: &str) -> anyhow::Result<String> {
    let symbol = raw.trim().to_uppercase();
    anyhow::ensure!(!symbol.is_empty(), "symbol must be non-empty");
    anyhow::ensure!(
        symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')),
        "invalid symbol {raw:?}"
    );
    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{RiskLevel, Verdict};
    use crate::domain::series::fixtures::series_from_closes;

    #[test]
    fn builds_report_with_change_and_chart() {
        let closes: Vec<f64> = (1..=60).map(f64::from).collect();
        let series = series_from_closes(&closes);
        let metrics = CompanyMetrics {
            long_name: Some("Example Corp".to_string()),
            ..Default::default()
        };

        let (report, chart) = build_report(
            "EXM",
            Period::OneYear,
            &series,
            &metrics,
            Vec::new(),
            &AnalysisSettings::default(),
        )
        .unwrap();

        assert_eq!(report.name, "Example Corp");
        assert_eq!(report.current_price, 60.0);
        let change = report.change_pct.unwrap();
        assert!((change - 100.0 / 59.0).abs() < 1e-9);
        assert_eq!(report.key_metrics.len(), 7);
        assert_eq!(chart.points.len(), 60);
        assert_eq!(chart.rsi_levels.overbought, 70.0);
        // Straight line up: RSI pinned at 100, so the table says sell.
        let r = report.outcome.recommendation();
        assert_eq!((r.recommendation, r.risk_level), (Verdict::Sell, RiskLevel::High));
    }

    #[test]
    fn single_bar_falls_back_without_chart() {
        let series = series_from_closes(&[42.0]);
        let (report, chart) = build_report(
            "ONE",
            Period::OneMonth,
            &series,
            &CompanyMetrics::default(),
            Vec::new(),
            &AnalysisSettings::default(),
        )
        .unwrap();
        assert_eq!(report.name, "ONE");
        assert_eq!(report.change_pct, None);
        assert!(!report.outcome.is_computed());
        assert!(chart.points.is_empty());
    }

    struct FakeProvider {
        news: Option<Vec<NewsItem>>,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_series(&self, _symbol: &str, _period: Period) -> anyhow::Result<PriceSeries> {
            let closes: Vec<f64> = (1..=30).map(f64::from).collect();
            Ok(series_from_closes(&closes))
        }

        async fn fetch_metadata(&self, _symbol: &str) -> anyhow::Result<CompanyMetrics> {
            Ok(CompanyMetrics::default())
        }

        async fn fetch_quote(
            &self,
            symbol: &str,
        ) -> anyhow::Result<crate::domain::portfolio::Quote> {
            anyhow::bail!("no quote for {symbol}")
        }

        async fn fetch_news(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<NewsItem>> {
            assert_eq!(limit, DEFAULT_NEWS_LIMIT);
            self.news
                .clone()
                .ok_or_else(|| anyhow::anyhow!("news feed down for {symbol}"))
        }
    }

    fn headline(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            publisher: "Wire".to_string(),
            link: "https://example.com".to_string(),
            published: None,
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn fetched_report_carries_headlines() {
        let provider = FakeProvider {
            news: Some(vec![headline("Earnings beat")]),
        };
        let (report, _) = fetch_report(&provider, "exm", Period::OneYear, &AnalysisSettings::default())
            .await
            .unwrap();
        assert_eq!(report.symbol, "EXM");
        assert_eq!(report.news, vec![headline("Earnings beat")]);
    }

    #[tokio::test]
    async fn news_failure_leaves_report_intact() {
        let provider = FakeProvider { news: None };
        let (report, chart) =
            fetch_report(&provider, "EXM", Period::OneYear, &AnalysisSettings::default())
                .await
                .unwrap();
        assert!(report.news.is_empty());
        assert_eq!(chart.points.len(), 30);
    }

    #[test]
    fn normalizes_symbols() {
        assert_eq!(normalize_symbol(" brk-b ").unwrap(), "BRK-B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("AA/PL").is_err());
    }
}
