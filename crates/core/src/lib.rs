pub mod domain;
pub mod feed;
pub mod ingest;

pub mod config {
    use anyhow::ensure;
    use std::time::Duration;

    pub const DEFAULT_BASE_URL: &str = "https://apewisdom.io/api/v1.0";
    pub const DEFAULT_FILTER: &str = "all-stocks";
    const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
    const DEFAULT_ERROR_BACKOFF_SECS: u64 = 60;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub base_url: String,
        pub min_interval: Duration,
        pub request_timeout: Duration,
        pub filter_type: String,
        pub refresh_interval: Duration,
        pub error_backoff: Duration,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                base_url: DEFAULT_BASE_URL.to_string(),
                min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
                request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                filter_type: DEFAULT_FILTER.to_string(),
                refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
                error_backoff: Duration::from_secs(DEFAULT_ERROR_BACKOFF_SECS),
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        /// Reads the environment without validating it; callers apply any
        /// command-line overrides first and then call [`Settings::validate`].
        pub fn from_env() -> Self {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
            let text = |key: &str, default: &str| {
                var(key)
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| default.to_string())
            };
            let num = |key: &str, default: u64| {
                var(key)
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(default)
            };

            Self {
                base_url: text("APEWISDOM_BASE_URL", DEFAULT_BASE_URL),
                min_interval: Duration::from_millis(num(
                    "APEWISDOM_MIN_INTERVAL_MS",
                    DEFAULT_MIN_INTERVAL_MS,
                )),
                request_timeout: Duration::from_secs(num(
                    "APEWISDOM_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )),
                filter_type: text("APEWISDOM_FILTER", DEFAULT_FILTER),
                refresh_interval: Duration::from_secs(num(
                    "REFRESH_INTERVAL_SECS",
                    DEFAULT_REFRESH_INTERVAL_SECS,
                )),
                error_backoff: Duration::from_secs(num(
                    "REFRESH_ERROR_BACKOFF_SECS",
                    DEFAULT_ERROR_BACKOFF_SECS,
                )),
                sentry_dsn: var("SENTRY_DSN"),
            }
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            ensure!(
                !self.refresh_interval.is_zero(),
                "refresh interval must be greater than zero"
            );
            ensure!(
                self.error_backoff < self.refresh_interval,
                "error backoff ({:?}) must be shorter than the refresh interval ({:?})",
                self.error_backoff,
                self.refresh_interval
            );
            ensure!(
                !self.request_timeout.is_zero(),
                "request timeout must be greater than zero"
            );
            Ok(())
        }
    }

}

#[cfg(test)]
mod test_support;
