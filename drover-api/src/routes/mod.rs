//! REST API routes
//!
//! All handlers are organized by surface:
//! - `manifest`: device-facing update checks
//! - `builds`: build registration and rollout admin operations
//! - `executions`: fleet command execution admin + device status callbacks
//! - `devices`: registry read-through for dashboards
//! - `health`: liveness and engine counters
//!
//! The assembled router lives under `/api/v1` with CORS and request tracing.

pub mod builds;
pub mod devices;
pub mod executions;
pub mod health;
pub mod manifest;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::state::AppState;

/// Handler for /api/v1/openapi.json.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Build the CORS layer from configured origins; empty means allow-all for
/// development.
fn cors_layer(config: &ApiConfig) -> ApiResult<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-api-key")]);

    if config.cors_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins: Result<Vec<HeaderValue>, _> = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect();
    let origins = origins.map_err(|e| {
        crate::error::ApiError::invalid_input(format!("Invalid CORS origin: {e}"))
    })?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Assemble the full API router.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> ApiResult<Router> {
    let api = Router::new()
        .merge(manifest::create_router())
        .merge(builds::create_router())
        .merge(executions::create_router())
        .merge(devices::create_router())
        .merge(health::create_router());

    #[cfg(feature = "openapi")]
    let api = api.route("/openapi.json", axum::routing::get(openapi_json));

    Ok(Router::new()
        .nest("/api/v1", api)
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
