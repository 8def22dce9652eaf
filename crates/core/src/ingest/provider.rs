use crate::config::Settings;
use crate::ingest::error::{FeedError, FetchFailure};
use anyhow::Context;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Anything that can turn a path under a fixed base URL into a JSON value.
#[async_trait::async_trait]
pub trait JsonSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, path: &str) -> Result<Value, FeedError>;
}

#[derive(Debug)]
pub struct RateLimitedHttpClient {
    http: reqwest::Client,
    base_url: String,
    pacer: RequestPacer,
}

impl RateLimitedHttpClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(
            &settings.base_url,
            settings.min_interval,
            settings.request_timeout,
        )
    }

    pub fn new(base_url: &str, min_interval: Duration, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!base_url.trim().is_empty(), "base url must be non-empty");
        anyhow::ensure!(!timeout.is_zero(), "request timeout must be greater than zero");

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build apewisdom http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            pacer: RequestPacer::new(min_interval),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchFailure> {
        let res = self.http.get(url).send().await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            tracing::debug!(%url, http_status = %status, body = %truncate(&text, 256), "apewisdom non-success response");
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        Ok(serde_json::from_str::<Value>(&text)?)
    }
}

#[async_trait::async_trait]
impl JsonSource for RateLimitedHttpClient {
    fn source_name(&self) -> &'static str {
        "apewisdom"
    }

    async fn fetch(&self, path: &str) -> Result<Value, FeedError> {
        let url = self.url(path);
        let res = self.pacer.paced(self.get_json(&url)).await;
        res.map_err(|cause| FeedError::fetch_failed(url, cause))
    }
}

/// Serializes requests and keeps at least `min_interval` between the end of
/// one request and the start of the next. The marker moves after every
/// attempt, failed ones included.
#[derive(Debug)]
struct RequestPacer {
    min_interval: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_finished: Mutex::new(None),
        }
    }

    async fn paced<F, T>(&self, request: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last = self.last_finished.lock().await;
        if let Some(finished) = *last {
            let ready_at = finished + self.min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "pacing apewisdom request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let out = request.await;
        *last = Some(Instant::now());
        out
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
