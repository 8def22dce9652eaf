use crate::domain::mention::Snapshot;
use crate::feed::LoopPhase;
use crate::ingest::FeedError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedHealth {
    NeverFetched,
    Healthy,
    /// At least one cycle failed since the last published snapshot.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub health: FeedHealth,
    pub phase: LoopPhase,
    pub last_update: Option<DateTime<Utc>>,
    pub seconds_until_next_update: u64,
    pub failed_cycles: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    snapshot: Option<Arc<Snapshot>>,
    phase: LoopPhase,
    next_attempt_at: Option<Instant>,
    failed_cycles: u64,
    consecutive_failures: u64,
    last_error: Option<String>,
}

/// Outcome of one fetch cycle, applied to the register in a single write.
#[derive(Debug)]
pub(crate) enum CycleOutcome {
    Published(Snapshot),
    Failed(FeedError),
}

/// The latest snapshot plus loop bookkeeping. Cloning shares the same
/// register. Only the refresh loop writes; any number of readers may query.
/// Locks are held for the read or swap only.
#[derive(Debug, Clone)]
pub struct SnapshotRegister {
    state: Arc<RwLock<FeedState>>,
    cycles: Arc<watch::Sender<u64>>,
}

impl Default for SnapshotRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRegister {
    pub fn new() -> Self {
        let (cycles, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(FeedState::default())),
            cycles: Arc::new(cycles),
        }
    }

    pub fn get_latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.read(|s| s.snapshot.clone())
    }

    pub fn get_last_update_time(&self) -> Option<DateTime<Utc>> {
        self.read(|s| s.snapshot.as_ref().map(|snap| snap.fetched_at))
    }

    /// Zero while a fetch is in progress or the loop is not holding.
    pub fn get_seconds_until_next_update(&self) -> u64 {
        self.read(|s| seconds_until(s.next_attempt_at))
    }

    pub fn health(&self) -> FeedHealth {
        self.read(health_of)
    }

    pub fn status(&self) -> FeedStatus {
        self.read(status_of)
    }

    /// The latest snapshot with the status recorded alongside it, read under
    /// one lock so both describe the same cycle.
    pub fn snapshot_with_status(&self) -> Option<(Arc<Snapshot>, FeedStatus)> {
        self.read(|s| {
            let snapshot = s.snapshot.clone()?;
            Some((snapshot, status_of(s)))
        })
    }

    /// Completed-cycle counter; changes once per finished cycle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cycles.subscribe()
    }

    pub(crate) fn enter_fetching(&self) {
        self.write(|s| {
            s.phase = LoopPhase::Fetching;
            s.next_attempt_at = None;
        });
    }

    /// Records a finished cycle and what the loop does next. `next_attempt_at`
    /// is `None` when the loop is stopping.
    pub(crate) fn finish_cycle(&self, outcome: CycleOutcome, next_attempt_at: Option<Instant>) {
        self.write(|s| {
            match outcome {
                CycleOutcome::Published(snapshot) => {
                    s.snapshot = Some(Arc::new(snapshot));
                    s.consecutive_failures = 0;
                }
                CycleOutcome::Failed(err) => {
                    s.failed_cycles += 1;
                    s.consecutive_failures += 1;
                    s.last_error = Some(err.to_string());
                }
            }
            s.next_attempt_at = next_attempt_at;
            s.phase = if next_attempt_at.is_some() {
                LoopPhase::Holding
            } else {
                LoopPhase::Stopped
            };
        });
        self.cycles.send_modify(|n| *n += 1);
    }

    pub(crate) fn enter_stopped(&self) {
        self.write(|s| {
            s.phase = LoopPhase::Stopped;
            s.next_attempt_at = None;
        });
    }

    fn read<T>(&self, f: impl FnOnce(&FeedState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut FeedState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

fn status_of(s: &FeedState) -> FeedStatus {
    FeedStatus {
        health: health_of(s),
        phase: s.phase,
        last_update: s.snapshot.as_ref().map(|snap| snap.fetched_at),
        seconds_until_next_update: seconds_until(s.next_attempt_at),
        failed_cycles: s.failed_cycles,
        consecutive_failures: s.consecutive_failures,
        last_error: s.last_error.clone(),
    }
}

fn health_of(s: &FeedState) -> FeedHealth {
    match (&s.snapshot, s.consecutive_failures) {
        (None, _) => FeedHealth::NeverFetched,
        (Some(_), 0) => FeedHealth::Healthy,
        (Some(_), _) => FeedHealth::Stale,
    }
}

fn seconds_until(deadline: Option<Instant>) -> u64 {
    deadline
        .map(|t| t.saturating_duration_since(Instant::now()).as_secs())
        .unwrap_or(0)
}
