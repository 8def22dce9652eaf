use apewatch_core::domain::mention::{Snapshot, StockMention};

/// One log-friendly line per row: rank, ticker, mentions, upvotes, 24h change.
pub fn format_row(m: &StockMention) -> String {
    let change = match m.mention_change() {
        Some(d) => format!("{d:+}"),
        None => "n/a".to_string(),
    };
    format!(
        "#{:<3} {:<8} {:>7} mentions {:>8} upvotes  24h {}",
        m.rank, m.ticker, m.mentions, m.upvotes, change
    )
}

pub fn log_snapshot(snapshot: &Snapshot, top: usize) {
    tracing::info!(
        snapshot_id = %snapshot.snapshot_id,
        filter_type = %snapshot.filter_type,
        fetched_at = %snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S"),
        rows = snapshot.len(),
        total_pages = snapshot.total_pages,
        "snapshot"
    );
    for m in snapshot.top_by_mentions(top) {
        tracing::info!("{}", format_row(m));
    }
}

/// Countdown text as the dashboards show it, e.g. `4m 05s`.
pub fn countdown(seconds: u64) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}
