use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apewatch_core::config::Settings;
use apewatch_core::domain::mention::{Snapshot, StockMention};
use apewatch_core::feed::{FeedStatus, RefreshConfig, RefreshTask, SnapshotRegister};
use apewatch_core::ingest::{MentionFeedFetcher, RateLimitedHttpClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env();
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if let Err(e) = settings.validate() {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %e, "invalid settings");
        return Err(e);
    }

    let client = match RateLimitedHttpClient::from_settings(&settings) {
        Ok(client) => client,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "failed to build apewisdom client");
            return Err(e);
        }
    };

    let register = SnapshotRegister::new();
    let refresh = RefreshTask::spawn(
        MentionFeedFetcher::new(Arc::new(client)),
        register.clone(),
        RefreshConfig::from_settings(&settings),
    )?;

    let app = router(AppState { register });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.stop().await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .route("/snapshots/latest", get(get_latest_snapshot))
        .route("/mentions/:ticker", get(get_mention_by_ticker))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    register: SnapshotRegister,
}

#[derive(Debug, Serialize)]
struct ApiSnapshot {
    status: FeedStatus,
    snapshot: Arc<Snapshot>,
}

async fn get_status(State(state): State<AppState>) -> Json<FeedStatus> {
    Json(state.register.status())
}

async fn get_latest_snapshot(
    State(state): State<AppState>,
) -> Result<Json<ApiSnapshot>, StatusCode> {
    let (snapshot, status) = state
        .register
        .snapshot_with_status()
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiSnapshot { status, snapshot }))
}

async fn get_mention_by_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockMention>, StatusCode> {
    let snapshot = state
        .register
        .get_latest_snapshot()
        .ok_or(StatusCode::NOT_FOUND)?;

    snapshot
        .find(&ticker)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
