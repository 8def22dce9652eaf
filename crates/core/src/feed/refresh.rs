use crate::config::Settings;
use crate::feed::register::{CycleOutcome, SnapshotRegister};
use crate::ingest::MentionFeedFetcher;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    #[default]
    Idle,
    Fetching,
    Holding,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub filter_type: String,
    pub interval: Duration,
    /// Wait after a failed cycle. Must be shorter than `interval`.
    pub error_backoff: Duration,
}

impl RefreshConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            filter_type: settings.filter_type.clone(),
            interval: settings.refresh_interval,
            error_backoff: settings.error_backoff,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.filter_type.trim().is_empty(),
            "filter type must be non-empty"
        );
        anyhow::ensure!(
            self.error_backoff < self.interval,
            "error backoff ({:?}) must be shorter than the refresh interval ({:?})",
            self.error_backoff,
            self.interval
        );
        Ok(())
    }
}

enum LoopState {
    Idle,
    Fetching,
    Holding(Instant),
    Stopped,
}

/// Fetches page 1 of `config.filter_type`, publishes it, waits, repeats.
/// `config` is expected to have passed [`RefreshConfig::validate`];
/// [`RefreshTask::spawn`] checks this before starting the loop.
///
/// Failed cycles keep the previous snapshot and retry after
/// `config.error_backoff` instead of `config.interval`. Cancellation is
/// observed while holding and between steps; a fetch already in flight runs
/// to completion (and is published if it succeeded) before the loop exits.
pub async fn run_refresh_loop(
    fetcher: MentionFeedFetcher,
    register: SnapshotRegister,
    config: RefreshConfig,
    cancel: CancellationToken,
) {
    let filter_type = config.filter_type.as_str();
    let mut state = LoopState::Idle;

    loop {
        state = match state {
            LoopState::Idle => {
                tracing::info!(
                    filter_type,
                    interval_secs = config.interval.as_secs(),
                    error_backoff_secs = config.error_backoff.as_secs(),
                    source = fetcher.source_name(),
                    "refresh loop started"
                );
                LoopState::Fetching
            }
            LoopState::Fetching => {
                if cancel.is_cancelled() {
                    LoopState::Stopped
                } else {
                    register.enter_fetching();
                    let (outcome, wait) = match fetcher.fetch_snapshot(filter_type).await {
                        Ok(snapshot) => {
                            tracing::info!(
                                filter_type,
                                snapshot_id = %snapshot.snapshot_id,
                                rows = snapshot.len(),
                                total_pages = snapshot.total_pages,
                                "published mention snapshot"
                            );
                            (CycleOutcome::Published(snapshot), config.interval)
                        }
                        Err(err) => {
                            tracing::error!(
                                filter_type,
                                error_kind = err.kind(),
                                error = %err,
                                retry_in_secs = config.error_backoff.as_secs(),
                                "refresh cycle failed; keeping previous snapshot"
                            );
                            (CycleOutcome::Failed(err), config.error_backoff)
                        }
                    };

                    if cancel.is_cancelled() {
                        register.finish_cycle(outcome, None);
                        LoopState::Stopped
                    } else {
                        let next_attempt_at = Instant::now() + wait;
                        register.finish_cycle(outcome, Some(next_attempt_at));
                        LoopState::Holding(next_attempt_at)
                    }
                }
            }
            LoopState::Holding(next_attempt_at) => {
                tokio::select! {
                    _ = cancel.cancelled() => LoopState::Stopped,
                    _ = tokio::time::sleep_until(next_attempt_at) => LoopState::Fetching,
                }
            }
            LoopState::Stopped => break,
        };
    }

    register.enter_stopped();
    tracing::info!(filter_type, "refresh loop stopped");
}

/// A refresh loop running as a background task.
#[derive(Debug)]
pub struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Validates `config` and starts the loop on the current runtime.
    pub fn spawn(
        fetcher: MentionFeedFetcher,
        register: SnapshotRegister,
        config: RefreshConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_refresh_loop(
            fetcher,
            register,
            config,
            cancel.clone(),
        ));
        Ok(Self { cancel, handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Requests cancellation and waits for the loop to exit.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| anyhow::anyhow!("refresh loop task failed: {e}"))
    }
}
