use crate::config::Settings;
use crate::domain::metrics::CompanyMetrics;
use crate::domain::news::NewsItem;
use crate::domain::portfolio::Quote;
use crate::domain::series::{PriceBar, PriceSeries};
use crate::market::{MarketDataProvider, Period};
use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; stockscope/0.1)";
const QUOTE_RANGE: &str = "5d";
const SUMMARY_MODULES: &str = "price,summaryDetail,assetProfile";
const MAX_BACKOFF_SECS: u64 = 60;

/// Daily bars and company facts from the Yahoo Finance query API.
#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = settings
            .market_data_user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(agent).context("MARKET_DATA_USER_AGENT is not a valid header")?,
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.market_data_timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.market_data_base_url.clone(),
            retries: settings.market_data_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {}", truncate(&text, 512));
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected market data payload: {}", truncate(&text, 512)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(url, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_after(attempt);
                    tracing::warn!(attempt, ?backoff, %url, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<ParsedChart> {
        let url = self.url(&format!("/v8/finance/chart/{symbol}"));
        let resp: ChartResponse = self
            .get_json(&url, &[("range", range), ("interval", "1d")])
            .await
            .with_context(|| format!("failed to fetch {range} chart for {symbol}"))?;
        parse_chart(symbol, resp)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_series(&self, symbol: &str, period: Period) -> Result<PriceSeries> {
        let series = self.fetch_chart(symbol, period.as_str()).await?.series;
        tracing::info!(%symbol, %period, bars = series.len(), "fetched price series");
        Ok(series)
    }

    async fn fetch_metadata(&self, symbol: &str) -> Result<CompanyMetrics> {
        let url = self.url(&format!("/v10/finance/quoteSummary/{symbol}"));
        let resp: QuoteSummaryResponse = self
            .get_json(&url, &[("modules", SUMMARY_MODULES)])
            .await
            .with_context(|| format!("failed to fetch company metadata for {symbol}"))?;
        parse_quote_summary(symbol, resp)
    }

    async fn fetch_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let url = self.url("/v1/finance/search");
        let count = limit.to_string();
        let resp: SearchResponse = self
            .get_json(
                &url,
                &[("q", symbol), ("quotesCount", "0"), ("newsCount", count.as_str())],
            )
            .await
            .with_context(|| format!("failed to fetch news for {symbol}"))?;

        let news = parse_news(resp, limit);
        tracing::info!(%symbol, items = news.len(), "fetched news");
        Ok(news)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let chart = self.fetch_chart(symbol, QUOTE_RANGE).await?;
        let (current_price, previous_close) = quote_prices(symbol, &chart)?;

        let metrics = self.fetch_metadata(symbol).await?;

        Ok(Quote {
            current_price,
            previous_close,
            sector: metrics.sector,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    gmtoffset: Option<i64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug)]
struct ParsedChart {
    series: PriceSeries,
    /// Close before the first bar of the requested range.
    chart_previous_close: Option<f64>,
}

fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<ParsedChart> {
    if let Some(err) = resp.chart.error {
        anyhow::bail!(
            "market data error for {symbol}: {} ({})",
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        );
    }

    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("no data found for {symbol}"))?;

    let offset = result.meta.gmtoffset.unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    let mut skipped: usize = 0;
    for (i, ts) in result.timestamp.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            skipped += 1;
            continue;
        };

        let date = DateTime::from_timestamp(ts + offset, 0)
            .with_context(|| format!("invalid bar timestamp {ts} for {symbol}"))?
            .date_naive();

        let bar = PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        };

        // A live intraday bar can share the date of the last daily bar; keep the newer one.
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    if skipped > 0 {
        tracing::debug!(%symbol, skipped, "dropped incomplete bars");
    }

    anyhow::ensure!(!bars.is_empty(), "no data found for {symbol}");
    let series =
        PriceSeries::new(bars).with_context(|| format!("invalid price series for {symbol}"))?;

    Ok(ParsedChart {
        series,
        chart_previous_close: result.meta.chart_previous_close.filter(|v| v.is_finite()),
    })
}

/// Latest close and the close before it. A one-bar range falls back to the chart's
/// previous close.
fn quote_prices(symbol: &str, chart: &ParsedChart) -> Result<(f64, f64)> {
    let current = chart
        .series
        .last()
        .map(|b| b.close)
        .with_context(|| format!("no recent bars for {symbol}"))?;
    let previous = chart
        .series
        .previous_close()
        .or(chart.chart_previous_close)
        .with_context(|| format!("no previous close for {symbol}"))?;
    Ok((current, previous))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    price: PriceModule,
    #[serde(default)]
    summary_detail: SummaryDetailModule,
    #[serde(default)]
    asset_profile: AssetProfileModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    #[serde(default)]
    market_cap: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(default)]
    market_cap: RawValue,
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
    #[serde(default)]
    beta: RawValue,
    #[serde(default)]
    fifty_two_week_high: RawValue,
    #[serde(default)]
    fifty_two_week_low: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
}

/// Numeric fields arrive as `{"raw": 1.0, "fmt": "1.00"}` or `{}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn parse_quote_summary(symbol: &str, resp: QuoteSummaryResponse) -> Result<CompanyMetrics> {
    if let Some(err) = resp.quote_summary.error {
        anyhow::bail!(
            "company metadata error for {symbol}: {} ({})",
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        );
    }

    let result = resp
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("no company metadata for {symbol}"))?;

    let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let detail = result.summary_detail;

    Ok(CompanyMetrics {
        long_name: non_empty(result.price.long_name).or(non_empty(result.price.short_name)),
        sector: non_empty(result.asset_profile.sector),
        industry: non_empty(result.asset_profile.industry),
        market_cap: detail.market_cap.raw.or(result.price.market_cap.raw),
        trailing_pe: detail.trailing_pe.raw,
        forward_pe: detail.forward_pe.raw,
        dividend_yield: detail.dividend_yield.raw,
        beta: detail.beta.raw,
        fifty_two_week_high: detail.fifty_two_week_high.raw,
        fifty_two_week_low: detail.fifty_two_week_low.raw,
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    link: String,
    provider_publish_time: Option<i64>,
    #[serde(default)]
    summary: String,
}

fn parse_news(resp: SearchResponse, limit: usize) -> Vec<NewsItem> {
    resp.news
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .take(limit)
        .map(|item| NewsItem {
            title: item.title.trim().to_string(),
            publisher: item.publisher,
            link: item.link,
            published: item
                .provider_publish_time
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            summary: item.summary,
        })
        .collect()
}

/// 1s, 2s, 4s, ... capped at a minute.
fn backoff_after(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn chart(v: serde_json::Value) -> ChartResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_chart_bars_and_drops_null_rows() {
        // 2024-01-02 14:30 UTC and the next two sessions.
        let resp = chart(json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "gmtoffset": -18000},
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {"quote": [{
                        "open":   [187.15, null, 182.15],
                        "high":   [188.44, null, 183.09],
                        "low":    [183.89, null, 180.88],
                        "close":  [185.64, null, 181.91],
                        "volume": [82488700, null, 71983600]
                    }]}
                }],
                "error": null
            }
        }));

        let series = parse_chart("AAPL", resp).unwrap().series;
        assert_eq!(series.len(), 2);
        assert_eq!(
            series.bars()[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert_eq!(series.bars()[1].close, 181.91);
        assert_eq!(series.bars()[1].volume, 71_983_600.0);
    }

    #[test]
    fn same_day_live_bar_replaces_previous() {
        let resp = chart(json!({
            "chart": {
                "result": [{
                    "timestamp": [1704205800, 1704218400],
                    "indicators": {"quote": [{
                        "open": [1.0, 1.0], "high": [1.0, 1.0], "low": [1.0, 1.0],
                        "close": [10.0, 11.0], "volume": [5, 6]
                    }]}
                }],
                "error": null
            }
        }));
        let series = parse_chart("X", resp).unwrap().series;
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 11.0);
    }

    #[test]
    fn single_bar_quote_uses_chart_previous_close() {
        let resp = chart(json!({
            "chart": {
                "result": [{
                    "meta": {"chartPreviousClose": 98.5},
                    "timestamp": [1704205800],
                    "indicators": {"quote": [{
                        "open": [99.0], "high": [101.0], "low": [98.0],
                        "close": [100.0], "volume": [1000]
                    }]}
                }],
                "error": null
            }
        }));
        let parsed = parse_chart("X", resp).unwrap();
        assert_eq!(quote_prices("X", &parsed).unwrap(), (100.0, 98.5));
    }

    #[test]
    fn chart_error_is_reported() {
        let resp = chart(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }));
        let err = parse_chart("NOPE", resp).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn parses_quote_summary_with_missing_fields() {
        let resp: QuoteSummaryResponse = serde_json::from_value(json!({
            "quoteSummary": {
                "result": [{
                    "price": {"longName": "Apple Inc.", "marketCap": {"raw": 2.9e12, "fmt": "2.9T"}},
                    "summaryDetail": {
                        "trailingPE": {"raw": 29.5, "fmt": "29.50"},
                        "forwardPE": {},
                        "beta": {"raw": 1.29},
                        "fiftyTwoWeekHigh": {"raw": 199.62},
                        "fiftyTwoWeekLow": {"raw": 164.08}
                    },
                    "assetProfile": {"sector": "Technology", "industry": "Consumer Electronics"}
                }],
                "error": null
            }
        }))
        .unwrap();

        let metrics = parse_quote_summary("AAPL", resp).unwrap();
        assert_eq!(metrics.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(metrics.sector.as_deref(), Some("Technology"));
        assert_eq!(metrics.market_cap, Some(2.9e12));
        assert_eq!(metrics.trailing_pe, Some(29.5));
        assert_eq!(metrics.forward_pe, None);
        assert_eq!(metrics.dividend_yield, None);
    }

    #[test]
    fn parses_search_news_and_applies_limit() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "explains": [],
            "count": 3,
            "quotes": [],
            "news": [
                {
                    "uuid": "a1",
                    "title": "Apple unveils new chip",
                    "publisher": "Reuters",
                    "link": "https://example.com/a1",
                    "providerPublishTime": 1704205800,
                    "type": "STORY"
                },
                {
                    "uuid": "a2",
                    "title": "  ",
                    "publisher": "Nobody",
                    "link": "https://example.com/a2"
                },
                {
                    "uuid": "a3",
                    "title": "Supplier outlook",
                    "publisher": "Bloomberg",
                    "link": "https://example.com/a3",
                    "summary": "Guidance raised."
                },
                {
                    "uuid": "a4",
                    "title": "Third story",
                    "publisher": "AP",
                    "link": "https://example.com/a4"
                }
            ]
        }))
        .unwrap();

        let news = parse_news(resp, 2);
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].title, "Apple unveils new chip");
        assert_eq!(news[0].publisher, "Reuters");
        assert_eq!(news[0].published_display(), "2024-01-02 14:30");
        assert_eq!(news[0].summary, "");
        assert_eq!(news[1].title, "Supplier outlook");
        assert_eq!(news[1].published, None);
        assert_eq!(news[1].summary, "Guidance raised.");
    }

    #[test]
    fn search_without_news_is_empty() {
        let resp: SearchResponse = serde_json::from_value(json!({"quotes": []})).unwrap();
        assert!(parse_news(resp, 5).is_empty());
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_after(1), Duration::from_secs(1));
        assert_eq!(backoff_after(2), Duration::from_secs(2));
        assert_eq!(backoff_after(4), Duration::from_secs(8));
        assert_eq!(backoff_after(65), Duration::from_secs(MAX_BACKOFF_SECS));
        assert_eq!(backoff_after(u32::MAX), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[test]
    fn rejects_malformed_chart_envelope() {
        let res = serde_json::from_value::<ChartResponse>(json!({"chart": "oops"}));
        assert!(res.is_err());
    }
}
