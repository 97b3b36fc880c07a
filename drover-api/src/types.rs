//! Request and response types for the REST API

use drover_core::{
    BuildId, DeviceResultStatus, ExecutionId, ExecutionMode, TargetSpec,
};
use drover_engine::ExecutionStarted;
use serde::{Deserialize, Serialize};

// ============================================================================
// BUILD TYPES
// ============================================================================

/// POST /api/v1/builds request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterBuildRequest {
    pub package_name: String,
    pub version_code: i64,
    pub version_name: String,
    /// Hex-encoded SHA-256 of the artifact
    pub checksum: String,
    pub signer_fingerprint: String,
    pub file_size: i64,
}

/// POST /api/v1/builds/{build_id}/promote request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PromoteRequest {
    pub rollout_percent: i64,
    #[serde(default)]
    pub wifi_only: bool,
    #[serde(default)]
    pub must_install: bool,
}

/// POST /api/v1/builds/{build_id}/rollout request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AdjustRolloutRequest {
    pub rollout_percent: i64,
}

/// Response for a rollout adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AdjustRolloutResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub build_id: BuildId,
    pub old_percent: u8,
    pub new_percent: u8,
}

/// POST /api/v1/packages/{package}/rollback request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RollbackRequest {
    #[serde(default)]
    pub force_downgrade: bool,
}

/// Query parameters for GET /api/v1/builds.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildListQuery {
    pub package: String,
}

// ============================================================================
// MANIFEST TYPES
// ============================================================================

/// Query parameters for GET /api/v1/manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestQuery {
    pub device_id: String,
    pub package: String,
    /// version_code currently installed on the device
    pub version_code: i64,
}

// ============================================================================
// EXECUTION TYPES
// ============================================================================

/// POST /api/v1/executions (and /executions/preview) request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExecuteRequest {
    pub mode: ExecutionMode,
    pub target: TargetSpec,
    /// Opaque payload for push_payload, command line for restricted_shell
    pub payload: String,
    /// When true the request behaves exactly like a preview: resolution
    /// only, no execution row, no dispatch.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Response for a started execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExecuteResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub exec_id: ExecutionId,
    pub total_targets: i64,
    pub sent_count: i64,
    pub unresolved: Vec<String>,
}

impl From<ExecutionStarted> for ExecuteResponse {
    fn from(started: ExecutionStarted) -> Self {
        Self {
            exec_id: started.exec_id,
            total_targets: started.total_targets,
            sent_count: started.sent_count,
            unresolved: started.unresolved,
        }
    }
}

/// POST /api/v1/executions/{exec_id}/devices/{device_id}/status body: one
/// status report from a device agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusCallbackRequest {
    pub status: DeviceResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Acknowledgement of a status callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusCallbackResponse {
    /// "applied", "duplicate", or "ignored"
    pub outcome: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_request_defaults() {
        let request: ExecuteRequest = serde_json::from_value(serde_json::json!({
            "mode": "push_payload",
            "target": { "type": "all" },
            "payload": "update"
        }))
        .unwrap();
        assert!(!request.dry_run);
        assert!(request.created_by.is_none());
        assert_eq!(
            request.target,
            TargetSpec::All { online_only: false }
        );
    }

    #[test]
    fn test_status_callback_parses_terminal_status() {
        let request: StatusCallbackRequest = serde_json::from_value(serde_json::json!({
            "status": "completed",
            "detail": "exit 0"
        }))
        .unwrap();
        assert_eq!(request.status, DeviceResultStatus::Completed);
    }
}
