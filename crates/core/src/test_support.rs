use crate::ingest::{FeedError, FetchFailure, JsonSource};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// In-memory source that replays a fixed script of responses, one per call.
/// `Err(status)` entries become `FetchFailed` with that HTTP status.
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<Result<Value, u16>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
    pub(crate) started: Notify,
}

impl ScriptedSource {
    pub(crate) fn new(script: Vec<Result<Value, u16>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            started: Notify::new(),
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait::async_trait]
impl JsonSource for ScriptedSource {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, path: &str) -> Result<Value, FeedError> {
        self.calls.lock().unwrap().push((path.to_string(), Instant::now()));
        self.started.notify_one();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(scripted_failure(path, status)),
            None => Err(scripted_failure(path, 503)),
        }
    }
}

fn scripted_failure(path: &str, status: u16) -> FeedError {
    FeedError::fetch_failed(format!("scripted:{path}"), FetchFailure::Status { status })
}

/// A page body whose rows are ranked consecutively from `first_rank`.
pub(crate) fn page_body(tickers: &[&str], first_rank: u32, pages: u32) -> Value {
    let results: Vec<Value> = tickers
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            json!({
                "rank": first_rank + i as u32,
                "ticker": ticker,
                "name": format!("{ticker} Holdings"),
                "mentions": (100 - i) as u64,
                "upvotes": "25",
                "rank_24h_ago": null,
                "mentions_24h_ago": "40",
            })
        })
        .collect();
    json!({ "count": results.len(), "pages": pages, "currentPage": 1, "results": results })
}
