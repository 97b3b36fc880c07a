//! Manifest check endpoint
//!
//! The device-facing side of staged rollout: a device reports its installed
//! version and either gets a manifest for the current build or a 304. The
//! check is side-effect-free with respect to rollout state.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use drover_core::{DeviceId, Manifest};
use drover_engine::RolloutController;
use std::sync::Arc;

use crate::auth::AuthExtractor;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::ManifestQuery;
use crate::validation::require_non_empty;

/// GET /api/v1/manifest - Update check for one device
#[utoipa::path(
    get,
    path = "/api/v1/manifest",
    tag = "Manifest",
    params(
        ("device_id" = String, Query, description = "Stable device identifier"),
        ("package" = String, Query, description = "Package name to check"),
        ("version_code" = i64, Query, description = "Installed version code"),
    ),
    responses(
        (status = 200, description = "Update available", body = Manifest),
        (status = 304, description = "No update for this device"),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn check_manifest(
    State(rollout): State<Arc<RolloutController>>,
    AuthExtractor(_auth): AuthExtractor,
    Query(query): Query<ManifestQuery>,
) -> Result<Response, ApiError> {
    require_non_empty("device_id", &query.device_id)?;
    require_non_empty("package", &query.package)?;

    let device_id = DeviceId::new(query.device_id);
    let manifest = rollout
        .check_manifest(&device_id, &query.package, query.version_code)
        .await?;

    Ok(match manifest {
        Some(manifest) => Json(manifest).into_response(),
        None => StatusCode::NOT_MODIFIED.into_response(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/manifest", get(check_manifest))
}
