use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headlines shown under a quote when the caller does not ask for a count.
pub const DEFAULT_NEWS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub publisher: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
}

impl NewsItem {
    /// `2024-01-02 14:30`, or empty when the publish time is unknown.
    pub fn published_display(&self) -> String {
        self.published
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}
