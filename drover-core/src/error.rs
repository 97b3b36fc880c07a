//! Error types for DROVER operations

use crate::{BuildId, BuildState, DeviceId, ExecutionId, ExecutionStatus};
use thiserror::Error;

/// Input validation errors, rejected before any dispatch happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Target set resolved to zero devices")]
    EmptyTargetSet,

    #[error("Rollout percent out of range: {value} (expected 0-100)")]
    PercentOutOfRange { value: i64 },

    #[error("Payload must not be empty")]
    EmptyPayload,

    #[error("Command not allowed: {reason}")]
    DisallowedCommand { reason: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },
}

/// Rollout state machine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RolloutError {
    #[error("Build not found: {build_id}")]
    BuildNotFound { build_id: BuildId },

    #[error("Another promotion is in flight for package {package_name}")]
    PromotionConflict { package_name: String },

    #[error("Build {build_id} is {state}, expected it to be current")]
    NotCurrent { build_id: BuildId, state: BuildState },

    #[error("Build {build_id} is {state}, cannot promote from this state")]
    NotPromotable { build_id: BuildId, state: BuildState },

    #[error("No prior build to roll back to for package {package_name}")]
    NoPriorBuild { package_name: String },

    #[error(
        "Version code {version_code} for package {package_name} is not above prior {prior}"
    )]
    VersionNotMonotonic {
        package_name: String,
        version_code: i64,
        prior: i64,
    },
}

/// Target resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Device registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },
}

/// Per-device transport failures. These are recorded on the device row and
/// never abort the execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("No push channel registered for device {device_id}")]
    NoChannel { device_id: DeviceId },

    #[error("Transport rejected call for device {device_id}: {reason}")]
    Rejected { device_id: DeviceId, reason: String },

    #[error("Transport call for device {device_id} timed out")]
    Timeout { device_id: DeviceId },
}

impl TransportError {
    /// Machine-readable reason recorded in the device result detail.
    pub fn reason_code(&self) -> &'static str {
        match self {
            TransportError::NoChannel { .. } => "no registered channel",
            TransportError::Rejected { .. } => "transport rejected",
            TransportError::Timeout { .. } => "transport timeout",
        }
    }
}

/// Execution lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Execution not found: {exec_id}")]
    ExecutionNotFound { exec_id: ExecutionId },

    #[error("Execution {exec_id} is {status}, cannot cancel")]
    NotCancellable {
        exec_id: ExecutionId,
        status: ExecutionStatus,
    },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Build not found: {build_id}")]
    BuildNotFound { build_id: BuildId },

    #[error("Execution not found: {exec_id}")]
    ExecutionNotFound { exec_id: ExecutionId },

    #[error("Device {device_id} is not part of execution {exec_id}")]
    DeviceNotInExecution {
        exec_id: ExecutionId,
        device_id: DeviceId,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all DROVER operations.
#[derive(Debug, Clone, Error)]
pub enum DroverError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Rollout error: {0}")]
    Rollout(#[from] RolloutError),

    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for DROVER operations.
pub type DroverResult<T> = Result<T, DroverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{new_build_id, new_execution_id};

    #[test]
    fn test_validation_error_display_percent() {
        let err = ValidationError::PercentOutOfRange { value: 140 };
        let msg = format!("{}", err);
        assert!(msg.contains("140"));
        assert!(msg.contains("0-100"));
    }

    #[test]
    fn test_rollout_error_display_conflict() {
        let err = RolloutError::PromotionConflict {
            package_name: "com.example.app".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("promotion is in flight"));
        assert!(msg.contains("com.example.app"));
    }

    #[test]
    fn test_rollout_error_display_not_current() {
        let err = RolloutError::NotCurrent {
            build_id: new_build_id(),
            state: BuildState::Draft,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("draft"));
        assert!(msg.contains("expected it to be current"));
    }

    #[test]
    fn test_transport_error_reason_codes() {
        let device_id = DeviceId::new("d-1");
        assert_eq!(
            TransportError::NoChannel {
                device_id: device_id.clone()
            }
            .reason_code(),
            "no registered channel"
        );
        assert_eq!(
            TransportError::Rejected {
                device_id: device_id.clone(),
                reason: "quota".to_string()
            }
            .reason_code(),
            "transport rejected"
        );
        assert_eq!(
            TransportError::Timeout { device_id }.reason_code(),
            "transport timeout"
        );
    }

    #[test]
    fn test_dispatch_error_display_not_cancellable() {
        let err = DispatchError::NotCancellable {
            exec_id: new_execution_id(),
            status: ExecutionStatus::Completed,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("completed"));
        assert!(msg.contains("cannot cancel"));
    }

    #[test]
    fn test_drover_error_from_variants() {
        let validation = DroverError::from(ValidationError::EmptyTargetSet);
        assert!(matches!(validation, DroverError::Validation(_)));

        let rollout = DroverError::from(RolloutError::NoPriorBuild {
            package_name: "p".to_string(),
        });
        assert!(matches!(rollout, DroverError::Rollout(_)));

        let transport = DroverError::from(TransportError::NoChannel {
            device_id: DeviceId::new("d"),
        });
        assert!(matches!(transport, DroverError::Transport(_)));

        let storage = DroverError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, DroverError::Storage(_)));
    }
}
