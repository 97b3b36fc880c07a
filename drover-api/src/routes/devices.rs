//! Device registry read-through
//!
//! Listing for the dashboard. The registry itself is owned by an external
//! collaborator; nothing here writes to it.

use axum::{extract::State, routing::get, Json, Router};
use drover_core::DeviceRecord;
use drover_storage::DeviceRegistry;
use std::sync::Arc;

use crate::auth::RequireAdmin;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/devices - All registered devices
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    tag = "Devices",
    responses(
        (status = 200, description = "Registered devices, sorted by id", body = [DeviceRecord]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn list_devices(
    State(registry): State<Arc<dyn DeviceRegistry>>,
    RequireAdmin(_auth): RequireAdmin,
) -> ApiResult<Json<Vec<DeviceRecord>>> {
    Ok(Json(registry.list().await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/devices", get(list_devices))
}
