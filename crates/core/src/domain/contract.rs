use crate::domain::mention::StockMention;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// A row that cannot be identified. Dropped from its page, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row rejected: {field} {reason}")]
pub struct RecordRejected {
    pub field: &'static str,
    pub reason: &'static str,
}

impl RecordRejected {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

/// Why a page body cannot be used at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageShapeError {
    #[error("expected a JSON object, got {got}")]
    NotAnObject { got: &'static str },

    #[error("missing `{0}`")]
    MissingKey(&'static str),

    #[error("`results` must be a list, got {got}")]
    ResultsNotAList { got: &'static str },

    #[error("`pages` is not an integer: {0}")]
    PagesNotAnInteger(String),
}

/// One page as sent by the remote API. Numeric fields arrive as numbers,
/// strings or null, so everything stays a raw `Value` until normalized.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMentionRow {
    #[serde(default)]
    pub rank: Value,
    #[serde(default)]
    pub ticker: Value,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub mentions: Value,
    #[serde(default)]
    pub upvotes: Value,
    #[serde(default)]
    pub rank_24h_ago: Value,
    #[serde(default)]
    pub mentions_24h_ago: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentionPage {
    pub items: Vec<StockMention>,
    pub total_pages: u32,
    pub rejected: usize,
}

impl MentionPage {
    /// Validates the top-level shape and normalizes every row.
    pub fn from_json(body: &Value) -> Result<Self, PageShapeError> {
        let obj = body
            .as_object()
            .ok_or(PageShapeError::NotAnObject { got: kind_of(body) })?;

        let results = obj
            .get("results")
            .ok_or(PageShapeError::MissingKey("results"))?;
        let results = results
            .as_array()
            .ok_or(PageShapeError::ResultsNotAList { got: kind_of(results) })?;

        let pages = obj.get("pages").ok_or(PageShapeError::MissingKey("pages"))?;
        let total_pages = coerce_int(pages)
            .ok_or_else(|| PageShapeError::PagesNotAnInteger(pages.to_string()))?
            .clamp(0, i64::from(u32::MAX)) as u32;

        let mut seen_ranks = BTreeSet::<u32>::new();
        let mut items = Vec::with_capacity(results.len());
        let mut rejected = 0usize;
        for (idx, raw) in results.iter().enumerate() {
            let row = if raw.is_object() {
                WireMentionRow::deserialize(raw)
                    .map_err(|_| RecordRejected::new("row", "is not an object"))
                    .and_then(|row| row.into_mention(&mut seen_ranks))
            } else {
                Err(RecordRejected::new("row", "is not an object"))
            };
            match row {
                Ok(item) => items.push(item),
                Err(err) => {
                    rejected += 1;
                    tracing::warn!(idx, row = %raw, error = %err, "dropping mention row");
                }
            }
        }

        Ok(Self {
            items,
            total_pages,
            rejected,
        })
    }
}

impl WireMentionRow {
    pub fn into_mention(self, seen_ranks: &mut BTreeSet<u32>) -> Result<StockMention, RecordRejected> {
        if self.rank.is_null() {
            return Err(RecordRejected::new("rank", "is missing"));
        }
        let rank = coerce_int(&self.rank)
            .and_then(|r| u32::try_from(r).ok())
            .filter(|r| *r >= 1)
            .ok_or(RecordRejected::new("rank", "is not a positive integer"))?;
        if !seen_ranks.insert(rank) {
            return Err(RecordRejected::new("rank", "repeats an earlier row"));
        }

        let ticker = coerce_text(&self.ticker).ok_or(RecordRejected::new("ticker", "is missing"))?;
        if ticker.is_empty() {
            return Err(RecordRejected::new("ticker", "is empty"));
        }

        let name = coerce_text(&self.name).ok_or(RecordRejected::new("name", "is missing"))?;

        Ok(StockMention {
            rank,
            mentions: coerce_count("mentions", &self.mentions),
            upvotes: coerce_count("upvotes", &self.upvotes),
            rank_24h_ago: coerce_optional("rank_24h_ago", &self.rank_24h_ago),
            mentions_24h_ago: coerce_optional("mentions_24h_ago", &self.mentions_24h_ago),
            ticker,
            name,
        })
    }
}

/// Integers may arrive as JSON numbers or numeric strings. Fractional
/// numbers truncate toward zero; fractional strings are treated as absent.
pub fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_count(field: &'static str, v: &Value) -> u64 {
    match coerce_int(v).and_then(|n| u64::try_from(n).ok()) {
        Some(n) => n,
        None => {
            if !v.is_null() {
                tracing::debug!(field, value = %v, "unparsable count; defaulting to 0");
            }
            0
        }
    }
}

fn coerce_optional(field: &'static str, v: &Value) -> Option<i64> {
    let out = coerce_int(v);
    if out.is_none() && !v.is_null() {
        tracing::debug!(field, value = %v, "unparsable value; treating as absent");
    }
    out
}

fn coerce_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
