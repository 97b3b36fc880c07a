//! OpenAPI specification for the DROVER API
//!
//! Generated with utoipa from route annotations and schema derives; served
//! at `/api/v1/openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::HealthResponse;
use crate::routes::{builds, devices, executions, health, manifest};
use crate::types::{
    AdjustRolloutRequest, AdjustRolloutResponse, ExecuteRequest, ExecuteResponse, PromoteRequest,
    RegisterBuildRequest, RollbackRequest, StatusCallbackRequest, StatusCallbackResponse,
};

use drover_core::{
    Build, BuildState, CounterSnapshot, DeviceFilter, DeviceId, DeviceRecord, DeviceResult,
    DeviceResultStatus, DeviceStatusUpdate, Execution, ExecutionMode, ExecutionReport,
    ExecutionStatus, Manifest, PromoteOutcome, ResolvedTargets, RollbackOutcome, TargetPreview,
    TargetSpec,
};

/// OpenAPI document for the DROVER API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DROVER API",
        version = "0.3.0",
        description = "Fleet command dispatch and staged rollout engine",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Manifest", description = "Device-facing staged rollout checks"),
        (name = "Builds", description = "Build registration, promotion, rollout, rollback"),
        (name = "Executions", description = "Fleet command execution and tracking"),
        (name = "Devices", description = "Registry read-through"),
        (name = "Health", description = "Liveness and engine counters")
    ),
    paths(
        manifest::check_manifest,
        builds::register_build,
        builds::list_builds,
        builds::promote_build,
        builds::adjust_rollout,
        builds::rollback_package,
        executions::preview_execution,
        executions::start_execution,
        executions::list_executions,
        executions::get_execution,
        executions::cancel_execution,
        executions::device_status_callback,
        devices::list_devices,
        health::health,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        Build,
        BuildState,
        CounterSnapshot,
        DeviceFilter,
        DeviceId,
        DeviceRecord,
        DeviceResult,
        DeviceResultStatus,
        DeviceStatusUpdate,
        Execution,
        ExecutionMode,
        ExecutionReport,
        ExecutionStatus,
        Manifest,
        PromoteOutcome,
        ResolvedTargets,
        RollbackOutcome,
        TargetPreview,
        TargetSpec,
        RegisterBuildRequest,
        PromoteRequest,
        AdjustRolloutRequest,
        AdjustRolloutResponse,
        RollbackRequest,
        ExecuteRequest,
        ExecuteResponse,
        StatusCallbackRequest,
        StatusCallbackResponse,
        HealthResponse,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the `X-Api-Key` security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/manifest"));
        assert!(doc.paths.paths.contains_key("/api/v1/executions"));
        assert!(doc
            .components
            .as_ref()
            .unwrap()
            .schemas
            .contains_key("Manifest"));
    }
}
