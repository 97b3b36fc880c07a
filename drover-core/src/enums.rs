//! Enum types for DROVER entities

use crate::filter::DeviceFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing a status string from the wire fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// BUILD LIFECYCLE
// ============================================================================

/// Lifecycle state of a build row.
///
/// At most one build per package is `Current` at any time; the rollout
/// controller serializes transitions per package to preserve that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    /// Uploaded but never promoted
    Draft,
    /// The one live build for its package
    Current,
    /// Replaced by a later promotion; eligible as a rollback target
    Superseded,
    /// Pulled back out of the fleet; never promoted again
    RolledBack,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Draft => "draft",
            BuildState::Current => "current",
            BuildState::Superseded => "superseded",
            BuildState::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildState {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BuildState::Draft),
            "current" => Ok(BuildState::Current),
            "superseded" => Ok(BuildState::Superseded),
            "rolled_back" => Ok(BuildState::RolledBack),
            other => Err(StatusParseError {
                kind: "build state",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// EXECUTION STATE MACHINE
// ============================================================================

/// What an execution pushes at the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Deliver an opaque payload (typically an update notification)
    PushPayload,
    /// Run one command from the restricted allow-list on the device agent
    RestrictedShell,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::PushPayload => "push_payload",
            ExecutionMode::RestrictedShell => "restricted_shell",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one fleet-wide execution.
///
/// `Pending -> Running -> {Completed, Cancelled}`. Completed covers the
/// global-timeout path as well: devices that never reported are individually
/// marked `Timeout` but the execution itself still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device status within an execution.
///
/// Transitions are monotonic toward a terminal state: once a device is in
/// {Completed, Failed, Timeout, Cancelled} no later update may move it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeviceResultStatus {
    /// Row created, dispatch not yet attempted
    Pending,
    /// Push transport accepted the wake-up call
    Sent,
    /// Device reported download in progress
    Downloading,
    /// Device reported install/command in progress
    Installing,
    /// Terminal: device reported success
    Completed,
    /// Terminal: transport or device reported failure
    Failed,
    /// Terminal: device never reached a terminal state within the window
    Timeout,
    /// Terminal: execution was cancelled before the device finished
    Cancelled,
}

impl DeviceResultStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeviceResultStatus::Completed
                | DeviceResultStatus::Failed
                | DeviceResultStatus::Timeout
                | DeviceResultStatus::Cancelled
        )
    }

    /// Terminal success. Everything else terminal counts toward `error_count`.
    pub fn is_success(&self) -> bool {
        matches!(self, DeviceResultStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceResultStatus::Pending => "pending",
            DeviceResultStatus::Sent => "sent",
            DeviceResultStatus::Downloading => "downloading",
            DeviceResultStatus::Installing => "installing",
            DeviceResultStatus::Completed => "completed",
            DeviceResultStatus::Failed => "failed",
            DeviceResultStatus::Timeout => "timeout",
            DeviceResultStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeviceResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceResultStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeviceResultStatus::Pending),
            "sent" => Ok(DeviceResultStatus::Sent),
            "downloading" => Ok(DeviceResultStatus::Downloading),
            "installing" => Ok(DeviceResultStatus::Installing),
            "completed" => Ok(DeviceResultStatus::Completed),
            "failed" => Ok(DeviceResultStatus::Failed),
            "timeout" => Ok(DeviceResultStatus::Timeout),
            "cancelled" => Ok(DeviceResultStatus::Cancelled),
            other => Err(StatusParseError {
                kind: "device result status",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// TARGET SPECIFICATION
// ============================================================================

/// Declarative target selection for an execution.
///
/// Resolution happens once, at execution (or preview) time, against the
/// external device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSpec {
    /// Every registered device, optionally restricted to reachable ones
    All {
        #[serde(default)]
        online_only: bool,
    },
    /// Devices matching a declarative predicate
    Filter { filter: DeviceFilter },
    /// An explicit list of device ids or aliases
    Devices { entries: Vec<String> },
}
