use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMention {
    pub rank: u32,
    pub ticker: String,
    pub name: String,
    pub mentions: u64,
    pub upvotes: u64,
    pub rank_24h_ago: Option<i64>,
    pub mentions_24h_ago: Option<i64>,
}

impl StockMention {
    /// Mentions gained (or lost) over the last 24 hours.
    pub fn mention_change(&self) -> Option<i64> {
        let before = self.mentions_24h_ago?;
        i64::try_from(self.mentions).ok()?.checked_sub(before)
    }

    /// Positive when the ticker climbed the ranking since yesterday.
    pub fn rank_change(&self) -> Option<i64> {
        let before = self.rank_24h_ago?;
        before.checked_sub(i64::from(self.rank))
    }
}

/// One successful fetch cycle. Never mutated after construction; the next
/// cycle builds a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: Uuid,
    pub filter_type: String,
    pub fetched_at: DateTime<Utc>,
    pub total_pages: u32,
    pub items: Vec<StockMention>,
}

impl Snapshot {
    pub fn new(filter_type: impl Into<String>, items: Vec<StockMention>, total_pages: u32) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            filter_type: filter_type.into(),
            fetched_at: Utc::now(),
            total_pages,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, ticker: &str) -> Option<&StockMention> {
        let ticker = ticker.trim();
        self.items
            .iter()
            .find(|m| m.ticker.eq_ignore_ascii_case(ticker))
    }

    pub fn top_by_mentions(&self, n: usize) -> Vec<&StockMention> {
        top_by_mentions(&self.items, n)
    }
}

/// Most mentioned rows first; ties keep the source ranking.
pub fn top_by_mentions<'a>(
    rows: impl IntoIterator<Item = &'a StockMention>,
    n: usize,
) -> Vec<&'a StockMention> {
    let mut rows: Vec<&StockMention> = rows.into_iter().collect();
    rows.sort_by(|a, b| b.mentions.cmp(&a.mentions).then(a.rank.cmp(&b.rank)));
    rows.truncate(n);
    rows
}
