//! External collaborator traits
//!
//! The push-notification transport and the device status source are peers
//! outside this system; DROVER talks to them only through these traits.
//! Production implementations live at the edges (the API crate wires an
//! HTTP push gateway); mocks live in drover-test-utils.

use crate::{DeviceId, DeviceStatusUpdate, ExecutionId, TransportError};
use async_trait::async_trait;
use thiserror::Error;

/// Push-notification channel used to wake a device and deliver a payload.
///
/// Delivery is best-effort and at-most-once per call; retries are the
/// dispatch batcher's job, not the transport's.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, device_id: &DeviceId, payload: &str) -> Result<(), TransportError>;
}

/// Error from one poll of the status source. Poll failures are transient by
/// definition: the supervisor logs them and retries next cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Status source query failed: {reason}")]
pub struct StatusSourceError {
    pub reason: String,
}

impl StatusSourceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Polled view of per-device command/install status.
///
/// Devices report through this source (or through the callback endpoint,
/// which bypasses it); reports may be duplicated or never arrive at all.
#[async_trait]
pub trait DeviceStatusSource: Send + Sync {
    /// Current status for the given devices of one execution. Devices with
    /// nothing new to report may simply be absent from the result.
    async fn poll(
        &self,
        exec_id: ExecutionId,
        device_ids: &[DeviceId],
    ) -> Result<Vec<DeviceStatusUpdate>, StatusSourceError>;
}
