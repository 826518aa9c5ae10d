//! HTTP trigger surface.
//!
//! The pipeline is invoked, not self-scheduling: an external scheduler or
//! operator tool POSTs to these routes. Results are structured JSON with an
//! `ok | partial | failed` status, never process exit semantics.

pub mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::{config::ServerConfig, persistence::sqlite::SqliteRepository, pipeline::Pipeline};
use error::ApiError;

/// Shared state behind the trigger surface.
#[derive(Clone)]
pub struct ApiState {
    /// The wired pipeline.
    pub pipeline: Arc<Pipeline<SqliteRepository>>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

/// Body for `POST /poll`.
#[derive(Debug, Deserialize)]
pub struct PollRequest {
    /// Poll a single wallet instead of all of them.
    #[serde(default)]
    pub address: Option<String>,
}

/// Body for `POST /dispatch`.
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    /// The alert to dispatch.
    pub alert_id: i64,
    /// Deliver without mutating the alert or recording attempts.
    #[serde(default)]
    pub test_mode: bool,
}

async fn poll(
    State(state): State<ApiState>,
    body: Option<Json<PollRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let address = body.as_ref().and_then(|b| b.address.clone());
    let report = state.pipeline.run_poll_cycle(address.as_deref()).await?;
    Ok(Json(report))
}

async fn dispatch(
    State(state): State<ApiState>,
    Json(body): Json<DispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .pipeline
        .dispatch_alert(body.alert_id, body.test_mode)
        .await?;
    Ok(Json(result))
}

async fn health_sweep(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.pipeline.run_health_sweep().await?;
    Ok(Json(report))
}

async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// Builds the trigger-surface router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/poll", post(poll))
        .route("/dispatch", post(dispatch))
        .route("/health/sweep", post(health_sweep))
        .route("/status", get(status))
        .with_state(state)
}

/// Runs the HTTP server based on the provided server configuration.
pub async fn run_server(
    config: &ServerConfig,
    state: ApiState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.listen_address.parse()?;
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Trigger surface listening.");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
