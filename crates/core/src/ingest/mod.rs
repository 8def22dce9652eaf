pub mod error;
pub mod fetcher;
pub mod provider;

pub use error::{FeedError, FetchFailure};
pub use fetcher::MentionFeedFetcher;
pub use provider::{JsonSource, RateLimitedHttpClient};
