use anyhow::{Context, Result};
use std::future::{Future, IntoFuture};
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::metrics::metrics_handler;
use super::upload_routes::{make_upload_routes, upload};
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub codec_available: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        codec_available: state.pipeline.normalizer().codec_available(),
    };
    Json(stats)
}

pub fn make_app(config: ServerConfig, pipeline: GuardedIngestPipeline) -> Router {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        pipeline,
    };

    let home_router: Router = Router::new()
        .route("/", get(home).post(upload))
        .with_state(state.clone());

    home_router
        .merge(make_upload_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(middleware::from_fn_with_state(state, log_requests))
        .layer(CorsLayer::permissive())
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the ingest app and the metrics endpoint until `shutdown` resolves.
pub async fn run_server<F>(
    config: ServerConfig,
    pipeline: GuardedIngestPipeline,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    let metrics_server = axum::serve(metrics_listener, make_metrics_app()).into_future();
    let app_server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        result = app_server => result.context("Ingest server failed")?,
        result = metrics_server => result.context("Metrics server failed")?,
    }

    info!("Server stopped");
    Ok(())
}
