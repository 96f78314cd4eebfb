use crate::domain::metrics::CompanyMetrics;
use crate::domain::news::NewsItem;
use crate::domain::portfolio::Quote;
use crate::domain::series::PriceSeries;
use crate::market::Period;
use crate::portfolio::QuoteLookup;
use anyhow::Result;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_series(&self, symbol: &str, period: Period) -> Result<PriceSeries>;

    async fn fetch_metadata(&self, symbol: &str) -> Result<CompanyMetrics>;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;

    /// Most recent headlines first, at most `limit` of them.
    async fn fetch_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

/// Adapts any provider to the aggregator's lookup seam.
pub struct ProviderQuotes<'a>(pub &'a dyn MarketDataProvider);

#[async_trait::async_trait]
impl QuoteLookup for ProviderQuotes<'_> {
    async fn lookup(&self, symbol: &str) -> Result<Quote> {
        self.0.fetch_quote(symbol).await
    }
}
