use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport, HTTP status, timeout or body-decoding failure. Never retried
    /// by the client itself.
    #[error("fetch failed for {url}: {cause}")]
    FetchFailed {
        url: String,
        #[source]
        cause: FetchFailure,
    },

    /// The body was JSON but lacked the keys a mention page requires.
    #[error("malformed response for {path}: {detail}")]
    MalformedResponse { path: String, detail: String },
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl FeedError {
    pub fn fetch_failed(url: impl Into<String>, cause: impl Into<FetchFailure>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            cause: cause.into(),
        }
    }

    /// Short label used in logs and status output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "fetch_failed",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}
