pub mod analysis;
pub mod chart;
pub mod domain;
pub mod format;
pub mod indicators;
pub mod market;
pub mod portfolio;
pub mod report;

pub mod config {
    use crate::portfolio::WeightingMode;
    use anyhow::Context;

    pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const MAX_MARKET_DATA_RETRIES: u32 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub market_data_base_url: String,
        pub market_data_timeout_secs: u64,
        pub market_data_retries: u32,
        pub market_data_user_agent: Option<String>,
        pub portfolio_weighting: WeightingMode,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let market_data_timeout_secs = match std::env::var("MARKET_DATA_TIMEOUT_SECS") {
                Ok(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("MARKET_DATA_TIMEOUT_SECS is not a number: {s}"))?,
                Err(_) => 30,
            };

            let market_data_retries =
                parse_retries(std::env::var("MARKET_DATA_RETRIES").ok().as_deref())?;

            let portfolio_weighting = match std::env::var("PORTFOLIO_WEIGHTING") {
                Ok(s) => s.parse::<WeightingMode>()?,
                Err(_) => WeightingMode::default(),
            };

            Ok(Self {
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string()),
                market_data_timeout_secs,
                market_data_retries,
                market_data_user_agent: std::env::var("MARKET_DATA_USER_AGENT").ok(),
                portfolio_weighting,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }
    }

    /// Attempts per market data request: 3 when unset, otherwise 1 through 10.
    fn parse_retries(raw: Option<&str>) -> anyhow::Result<u32> {
        let Some(s) = raw else {
            return Ok(3);
        };
        let retries = s
            .trim()
            .parse::<u32>()
            .with_context(|| format!("MARKET_DATA_RETRIES is not a number: {s}"))?;
        anyhow::ensure!(
            (1..=MAX_MARKET_DATA_RETRIES).contains(&retries),
            "MARKET_DATA_RETRIES must be between 1 and {MAX_MARKET_DATA_RETRIES} (got {retries})"
        );
        Ok(retries)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn retries_default_and_bounds() {
            assert_eq!(parse_retries(None).unwrap(), 3);
            assert_eq!(parse_retries(Some("1")).unwrap(), 1);
            assert_eq!(parse_retries(Some(" 10 ")).unwrap(), 10);
            assert!(parse_retries(Some("0")).is_err());
            assert!(parse_retries(Some("65")).is_err());
            assert!(parse_retries(Some("many")).is_err());
        }
    }
}
