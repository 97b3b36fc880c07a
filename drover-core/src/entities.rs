//! Core entity structures

use crate::{
    BuildId, BuildState, DeviceId, DeviceResultStatus, ExecutionId, ExecutionMode,
    ExecutionStatus, TargetSpec, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Build - one versioned installable artifact for a package.
///
/// Build rows are shared read-only by executions and manifest checks; the
/// rollout controller is the single writer for lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Build {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub build_id: BuildId,
    pub package_name: String,
    /// Strictly increasing per package
    pub version_code: i64,
    pub version_name: String,
    /// Hex-encoded SHA-256 of the artifact
    pub checksum: String,
    pub signer_fingerprint: String,
    pub file_size: i64,
    /// Cohorts below this percent are eligible (0 = nobody, 100 = everyone)
    pub rollout_percent: u8,
    pub wifi_only: bool,
    pub must_install: bool,
    pub state: BuildState,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Read model of one fleet member, as served by the external device registry.
///
/// DROVER never writes device rows; it reads identity, reachability, and
/// installed versions for targeting and eligibility decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub alias: String,
    pub online: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_seen: Option<Timestamp>,
    /// package name -> installed version_code
    pub installed_versions: HashMap<String, i64>,
}

/// Execution - one fleet-wide command or update run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Execution {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub exec_id: ExecutionId,
    pub mode: ExecutionMode,
    pub target_spec: TargetSpec,
    /// Opaque payload for PushPayload, command line for RestrictedShell
    pub payload: String,
    pub dry_run: bool,
    pub status: ExecutionStatus,
    pub created_by: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub finished_at: Option<Timestamp>,
}

impl Execution {
    pub fn new(
        exec_id: ExecutionId,
        mode: ExecutionMode,
        target_spec: TargetSpec,
        payload: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            exec_id,
            mode,
            target_spec,
            payload: payload.into(),
            dry_run: false,
            status: ExecutionStatus::Pending,
            created_by: created_by.into(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Per-device outcome row within an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceResult {
    pub device_id: DeviceId,
    pub alias: String,
    pub status: DeviceResultStatus,
    /// Exit code, error reason, or progress detail reported by the device
    pub detail: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl DeviceResult {
    pub fn pending(device_id: DeviceId, alias: impl Into<String>) -> Self {
        Self {
            device_id,
            alias: alias.into(),
            status: DeviceResultStatus::Pending,
            detail: None,
            updated_at: Utc::now(),
        }
    }
}

/// One status observation for a `(exec_id, device_id)` pair, as pushed by a
/// device callback or read from the polled status source. Duplicates are
/// expected and must be applied idempotently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceStatusUpdate {
    pub device_id: DeviceId,
    pub status: DeviceResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate counter view of one execution.
///
/// Invariants: `sent_count + not_yet_dispatched == total_targets` and
/// `acked_count + error_count <= sent_count + transport_failures`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CounterSnapshot {
    pub total_targets: i64,
    pub sent_count: i64,
    pub acked_count: i64,
    pub error_count: i64,
}

impl CounterSnapshot {
    /// Devices not yet in a terminal state.
    pub fn outstanding(&self) -> i64 {
        self.total_targets - self.acked_count - self.error_count
    }
}

/// Full status report for one execution: the execution row, its counters,
/// and every per-device result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExecutionReport {
    pub execution: Execution,
    pub counters: CounterSnapshot,
    pub device_results: Vec<DeviceResult>,
}

/// Update manifest returned to a device that is eligible for a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Manifest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub build_id: BuildId,
    pub package_name: String,
    pub version_code: i64,
    pub version_name: String,
    pub download_url: String,
    pub checksum: String,
    pub signer_fingerprint: String,
    pub file_size: i64,
    pub rollout_percent: u8,
    pub wifi_only: bool,
    pub must_install: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl Manifest {
    /// Build the manifest served for `build`, with the download URL the
    /// artifact store exposes for it.
    pub fn for_build(build: &Build, download_url: impl Into<String>) -> Self {
        Self {
            build_id: build.build_id,
            package_name: build.package_name.clone(),
            version_code: build.version_code,
            version_name: build.version_name.clone(),
            download_url: download_url.into(),
            checksum: build.checksum.clone(),
            signer_fingerprint: build.signer_fingerprint.clone(),
            file_size: build.file_size,
            rollout_percent: build.rollout_percent,
            wifi_only: build.wifi_only,
            must_install: build.must_install,
            release_notes: None,
        }
    }
}

/// Outcome of resolving a target spec against the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResolvedTargets {
    /// Matched devices, sorted by device id and deduplicated
    pub devices: Vec<DeviceRecord>,
    /// Entries from an explicit list that matched neither a device id nor
    /// an alias. Reported, never silently dropped.
    pub unresolved: Vec<String>,
}

impl ResolvedTargets {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Dry-run preview of a target resolution: the count, a bounded sample, and
/// any unresolved entries. Produced without any dispatch side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TargetPreview {
    pub count: usize,
    /// First K `(device_id, alias)` pairs in resolution order
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Vec<String>>))]
    pub sample: Vec<(String, String)>,
    pub unresolved: Vec<String>,
}

/// Result of a build promotion, for audit logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PromoteOutcome {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub build_id: BuildId,
    /// Build that was Current before this promotion, if any
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub prior_build_id: Option<BuildId>,
    pub rollout_percent: u8,
}

/// Result of a rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RollbackOutcome {
    /// Build that was pulled out of the fleet
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub rolled_back_build_id: BuildId,
    /// Build restored to Current
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub restored_build_id: BuildId,
    pub restored_version_code: i64,
    /// True when the restored version_code is lower than the rolled-back
    /// one. Rollback proceeds either way; callers surface the warning.
    pub downgrade: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::new_execution_id;

    #[test]
    fn test_execution_new_defaults() {
        let exec = Execution::new(
            new_execution_id(),
            ExecutionMode::PushPayload,
            TargetSpec::All { online_only: false },
            "update-notify",
            "ops@example.com",
        );
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(!exec.dry_run);
        assert!(exec.finished_at.is_none());
    }

    #[test]
    fn test_counter_snapshot_outstanding() {
        let counters = CounterSnapshot {
            total_targets: 15,
            sent_count: 12,
            acked_count: 7,
            error_count: 3,
        };
        assert_eq!(counters.outstanding(), 5);
    }

    #[test]
    fn test_manifest_for_build_carries_constraints() {
        let build = Build {
            build_id: crate::new_build_id(),
            package_name: "com.example.app".to_string(),
            version_code: 42,
            version_name: "1.4.2".to_string(),
            checksum: "ab".repeat(32),
            signer_fingerprint: "cd".repeat(32),
            file_size: 1024,
            rollout_percent: 25,
            wifi_only: true,
            must_install: false,
            state: BuildState::Current,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let manifest = Manifest::for_build(&build, "https://artifacts/com.example.app/42.apk");
        assert_eq!(manifest.version_code, 42);
        assert!(manifest.wifi_only);
        assert!(!manifest.must_install);
        assert_eq!(manifest.rollout_percent, 25);
    }
}
