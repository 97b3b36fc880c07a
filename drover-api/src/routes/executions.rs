//! Execution admin routes and the device status callback
//!
//! `POST /executions` starts a run (or behaves as a preview with
//! `dry_run: true`); per-device outcomes are only ever visible in the
//! execution report, never as a failure of the run itself. Device agents
//! push their status through the callback endpoint, which feeds the same
//! aggregator as the supervisor's poll loop.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use drover_core::{
    DeviceId, DeviceStatusUpdate, Execution, ExecutionId, ExecutionReport, TargetPreview,
};
use drover_engine::{AckAggregator, ExecutionRequest, ExecutionSupervisor};
use drover_storage::{ApplyOutcome, ExecutionStore};
use std::sync::Arc;

use crate::auth::{AuthExtractor, RequireAdmin};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{
    ExecuteRequest, ExecuteResponse, StatusCallbackRequest, StatusCallbackResponse,
};

fn to_engine_request(req: &ExecuteRequest) -> ExecutionRequest {
    ExecutionRequest {
        mode: req.mode,
        target_spec: req.target.clone(),
        payload: req.payload.clone(),
        created_by: req
            .created_by
            .clone()
            .unwrap_or_else(|| "api".to_string()),
    }
}

/// POST /api/v1/executions/preview - Resolve targets without dispatching
#[utoipa::path(
    post,
    path = "/api/v1/executions/preview",
    tag = "Executions",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Preview of the resolved target set", body = TargetPreview),
        (status = 400, description = "Validation failed", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn preview_execution(
    State(supervisor): State<Arc<ExecutionSupervisor>>,
    RequireAdmin(_auth): RequireAdmin,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<Json<TargetPreview>> {
    let preview = supervisor.preview(&to_engine_request(&req)).await?;
    Ok(Json(preview))
}

/// POST /api/v1/executions - Start a fleet execution
#[utoipa::path(
    post,
    path = "/api/v1/executions",
    tag = "Executions",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Execution started (or previewed for dry runs)", body = ExecuteResponse),
        (status = 400, description = "Validation failed", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn start_execution(
    State(supervisor): State<Arc<ExecutionSupervisor>>,
    RequireAdmin(_auth): RequireAdmin,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    if req.dry_run {
        let preview = supervisor.preview(&to_engine_request(&req)).await?;
        return Ok(Json(preview).into_response());
    }

    let started = supervisor.execute(to_engine_request(&req)).await?;
    Ok(Json(ExecuteResponse::from(started)).into_response())
}

/// GET /api/v1/executions - All executions, newest first
#[utoipa::path(
    get,
    path = "/api/v1/executions",
    tag = "Executions",
    responses(
        (status = 200, description = "Execution rows", body = [Execution]),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn list_executions(
    State(supervisor): State<Arc<ExecutionSupervisor>>,
    RequireAdmin(_auth): RequireAdmin,
) -> ApiResult<Json<Vec<Execution>>> {
    Ok(Json(supervisor.list()))
}

/// GET /api/v1/executions/{exec_id} - Execution report with device rows
#[utoipa::path(
    get,
    path = "/api/v1/executions/{exec_id}",
    tag = "Executions",
    params(("exec_id" = String, Path, description = "Execution id")),
    responses(
        (status = 200, description = "Execution report", body = ExecutionReport),
        (status = 404, description = "Execution not found", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn get_execution(
    State(supervisor): State<Arc<ExecutionSupervisor>>,
    RequireAdmin(_auth): RequireAdmin,
    Path(exec_id): Path<ExecutionId>,
) -> ApiResult<Json<ExecutionReport>> {
    Ok(Json(supervisor.get_status(exec_id)?))
}

/// POST /api/v1/executions/{exec_id}/cancel - Request cancellation
#[utoipa::path(
    post,
    path = "/api/v1/executions/{exec_id}/cancel",
    tag = "Executions",
    params(("exec_id" = String, Path, description = "Execution id")),
    responses(
        (status = 200, description = "Cancellation requested", body = ExecutionReport),
        (status = 404, description = "Execution not found", body = ApiError),
        (status = 409, description = "Execution already terminal", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn cancel_execution(
    State(supervisor): State<Arc<ExecutionSupervisor>>,
    RequireAdmin(_auth): RequireAdmin,
    Path(exec_id): Path<ExecutionId>,
) -> ApiResult<Json<ExecutionReport>> {
    supervisor.cancel(exec_id)?;
    Ok(Json(supervisor.get_status(exec_id)?))
}

/// POST /api/v1/executions/{exec_id}/devices/{device_id}/status - Device
/// agent status callback
#[utoipa::path(
    post,
    path = "/api/v1/executions/{exec_id}/devices/{device_id}/status",
    tag = "Executions",
    params(
        ("exec_id" = String, Path, description = "Execution id"),
        ("device_id" = String, Path, description = "Reporting device"),
    ),
    request_body = StatusCallbackRequest,
    responses(
        (status = 200, description = "Status applied (or absorbed as duplicate)", body = StatusCallbackResponse),
        (status = 404, description = "Execution or device not found", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn device_status_callback(
    State(executions): State<Arc<ExecutionStore>>,
    AuthExtractor(_auth): AuthExtractor,
    Path((exec_id, device_id)): Path<(ExecutionId, String)>,
    Json(req): Json<StatusCallbackRequest>,
) -> ApiResult<Json<StatusCallbackResponse>> {
    let aggregator = AckAggregator::new(executions);
    let outcome = aggregator.apply(
        exec_id,
        &DeviceStatusUpdate {
            device_id: DeviceId::new(device_id.clone()),
            status: req.status,
            detail: req.detail,
        },
    )?;

    let outcome = match outcome {
        ApplyOutcome::UnknownDevice => {
            return Err(ApiError::new(
                crate::error::ErrorCode::DeviceNotFound,
                format!("Device {device_id} is not part of execution {exec_id}"),
            ));
        }
        ApplyOutcome::FirstTerminal | ApplyOutcome::Progressed => "applied",
        ApplyOutcome::Duplicate => "duplicate",
        ApplyOutcome::Refused => "ignored",
    };
    Ok(Json(StatusCallbackResponse {
        outcome: outcome.to_string(),
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/executions", post(start_execution).get(list_executions))
        .route("/executions/preview", post(preview_execution))
        .route("/executions/:exec_id", get(get_execution))
        .route("/executions/:exec_id/cancel", post(cancel_execution))
        .route(
            "/executions/:exec_id/devices/:device_id/status",
            post(device_status_callback),
        )
}
