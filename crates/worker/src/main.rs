use anyhow::Context;
use apewatch_core::config::Settings;
use apewatch_core::domain::mention::top_by_mentions;
use apewatch_core::feed::{FeedHealth, RefreshConfig, RefreshTask, SnapshotRegister};
use apewatch_core::ingest::{MentionFeedFetcher, RateLimitedHttpClient};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;

#[derive(Debug, Parser)]
#[command(name = "apewatch_worker")]
struct Args {
    /// Board to query (all-stocks, all-crypto, wallstreetbets, ...). Defaults to APEWISDOM_FILTER.
    #[arg(long, global = true)]
    filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one page and report its size.
    Page {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Fetch every page and print the most mentioned tickers.
    All {
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Keep the latest snapshot fresh until Ctrl-C.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,

        #[arg(long)]
        error_backoff_secs: Option<u64>,

        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::from_env();
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(filter) = args.filter.as_deref() {
        settings.filter_type = filter.trim().to_string();
    }

    let res = run(args.command, settings).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    res
}

async fn run(command: Command, mut settings: Settings) -> anyhow::Result<()> {
    if let Command::Watch {
        interval_secs,
        error_backoff_secs,
        ..
    } = &command
    {
        apply_refresh_overrides(&mut settings, *interval_secs, *error_backoff_secs)?;
    }

    let client = RateLimitedHttpClient::from_settings(&settings)?;
    let fetcher = MentionFeedFetcher::new(Arc::new(client));
    let filter_type = settings.filter_type.clone();

    match command {
        Command::Page { page } => {
            let (items, total_pages) = fetcher
                .fetch_page(&filter_type, page)
                .await
                .with_context(|| format!("fetch page {page} of {filter_type} failed"))?;

            tracing::info!(
                %filter_type,
                page,
                rows = items.len(),
                total_pages,
                "page results"
            );
            for m in &items {
                tracing::info!("{}", report::format_row(m));
            }
        }
        Command::All { top } => {
            let all = fetcher
                .fetch_all(&filter_type)
                .await
                .with_context(|| format!("fetch all pages of {filter_type} failed"))?;

            tracing::info!(%filter_type, rows = all.len(), "total mentions collected");
            for m in top_by_mentions(&all, top) {
                tracing::info!("{}", report::format_row(m));
            }
        }
        Command::Watch { top, .. } => {
            watch(fetcher, RefreshConfig::from_settings(&settings), top).await?;
        }
    }

    Ok(())
}

/// Command-line intervals win over the environment; the result is validated
/// only after both are merged.
fn apply_refresh_overrides(
    settings: &mut Settings,
    interval_secs: Option<u64>,
    error_backoff_secs: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(secs) = interval_secs {
        settings.refresh_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = error_backoff_secs {
        settings.error_backoff = Duration::from_secs(secs);
    }
    settings.validate()
}

async fn watch(fetcher: MentionFeedFetcher, config: RefreshConfig, top: usize) -> anyhow::Result<()> {
    let register = SnapshotRegister::new();
    let mut cycles = register.subscribe();
    let task = RefreshTask::spawn(fetcher, register.clone(), config)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
            changed = cycles.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = register.status();
                let next = report::countdown(status.seconds_until_next_update);
                match status.health {
                    FeedHealth::Healthy => {
                        if let Some(snapshot) = register.get_latest_snapshot() {
                            report::log_snapshot(&snapshot, top);
                        }
                        tracing::info!(next_update_in = %next, "waiting for next refresh");
                    }
                    FeedHealth::Stale | FeedHealth::NeverFetched => {
                        tracing::warn!(
                            health = ?status.health,
                            consecutive_failures = status.consecutive_failures,
                            last_update = ?status.last_update,
                            last_error = status.last_error.as_deref().unwrap_or(""),
                            retry_in = %next,
                            "serving previous data"
                        );
                    }
                }
            }
        }
    }

    task.stop().await
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
