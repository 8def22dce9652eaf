use crate::domain::contract::MentionPage;
use crate::domain::mention::{Snapshot, StockMention};
use crate::ingest::error::FeedError;
use crate::ingest::provider::JsonSource;
use std::sync::Arc;

/// Pages through `/filter/{filter_type}/page/{page}` and normalizes rows.
#[derive(Clone)]
pub struct MentionFeedFetcher {
    source: Arc<dyn JsonSource>,
}

impl std::fmt::Debug for MentionFeedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MentionFeedFetcher")
            .field("source", &self.source.source_name())
            .finish()
    }
}

impl MentionFeedFetcher {
    pub fn new(source: Arc<dyn JsonSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    /// One page of rows plus the total page count the source reported.
    /// Unidentifiable rows are dropped; a body without `results` or `pages`
    /// fails the whole page.
    pub async fn fetch_page(
        &self,
        filter_type: &str,
        page: u32,
    ) -> Result<(Vec<StockMention>, u32), FeedError> {
        let path = page_path(filter_type, page);
        let body = self.source.fetch(&path).await?;

        let parsed = MentionPage::from_json(&body)
            .map_err(|err| FeedError::MalformedResponse {
                path: path.clone(),
                detail: err.to_string(),
            })?;

        tracing::debug!(
            %path,
            rows = parsed.items.len(),
            rejected = parsed.rejected,
            total_pages = parsed.total_pages,
            "fetched mention page"
        );
        Ok((parsed.items, parsed.total_pages))
    }

    /// Every page in order. The page bound comes from page 1 only; any
    /// failure discards the partial sweep.
    pub async fn fetch_all(&self, filter_type: &str) -> Result<Vec<StockMention>, FeedError> {
        let (mut all, total_pages) = self.fetch_page(filter_type, 1).await?;

        for page in 2..=total_pages {
            let (items, _) = self.fetch_page(filter_type, page).await?;
            all.extend(items);
        }

        tracing::info!(
            filter_type,
            total_pages,
            rows = all.len(),
            "fetched all mention pages"
        );
        Ok(all)
    }

    /// First page wrapped as a snapshot, as used by the refresh loop.
    pub async fn fetch_snapshot(&self, filter_type: &str) -> Result<Snapshot, FeedError> {
        let (items, total_pages) = self.fetch_page(filter_type, 1).await?;
        Ok(Snapshot::new(filter_type, items, total_pages))
    }
}

fn page_path(filter_type: &str, page: u32) -> String {
    format!("/filter/{filter_type}/page/{page}")
}
