//! Health endpoint
//!
//! Liveness plus a snapshot of the engine counters. No authentication.

use axum::{extract::State, routing::get, Json, Router};
use drover_engine::EngineMetrics;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Engine activity counters since startup
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub engine: serde_json::Value,
}

/// GET /api/v1/health - Liveness and engine counters
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health(
    State(metrics): State<Arc<EngineMetrics>>,
    State(start_time): State<std::time::Instant>,
) -> Json<HealthResponse> {
    let snapshot = metrics.snapshot();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: start_time.elapsed().as_secs(),
        engine: serde_json::to_value(snapshot).unwrap_or_default(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
