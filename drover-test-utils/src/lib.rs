//! DROVER Test Utilities
//!
//! Centralized test infrastructure for the DROVER workspace:
//! - Mock push transport with scriptable per-device failures
//! - Mock device status source with scripted report sequences
//! - Fixture constructors for devices and builds

// Re-export core types for convenience in test modules.
pub use drover_core::{
    DeviceId, DeviceRecord, DeviceResultStatus, DeviceStatusSource, DeviceStatusUpdate,
    ExecutionId, PushTransport, StatusSourceError, TransportError,
};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MOCK PUSH TRANSPORT
// ============================================================================

#[derive(Debug, Clone)]
enum FailurePlan {
    /// Fail every attempt
    Always(TransportError),
    /// Fail the first `remaining` attempts, then succeed
    Times { remaining: u32, error: TransportError },
}

#[derive(Debug, Default)]
struct TransportState {
    failures: HashMap<DeviceId, FailurePlan>,
    sent: Vec<DeviceId>,
    attempts: HashMap<DeviceId, u32>,
}

/// Scriptable [`PushTransport`] double.
///
/// By default every send succeeds instantly. Individual devices can be
/// scripted to fail permanently or for the first N attempts; every attempt
/// and every successful send is recorded for assertions.
#[derive(Debug, Default)]
pub struct MockPushTransport {
    state: Mutex<TransportState>,
    latency: Option<Duration>,
}

impl MockPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed delay to every send, for cancellation-window tests.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(TransportState::default()),
            latency: Some(latency),
        }
    }

    /// Every send to `device_id` fails with `error`.
    pub fn fail_always(&self, device_id: &DeviceId, error: TransportError) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .failures
            .insert(device_id.clone(), FailurePlan::Always(error));
    }

    /// The first `n` sends to `device_id` fail with `error`, later ones
    /// succeed.
    pub fn fail_times(&self, device_id: &DeviceId, n: u32, error: TransportError) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.failures.insert(
            device_id.clone(),
            FailurePlan::Times {
                remaining: n,
                error,
            },
        );
    }

    /// Devices successfully sent to, in completion order.
    pub fn sent_devices(&self) -> Vec<DeviceId> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sent
            .clone()
    }

    /// Send attempts (including failed ones) for one device.
    pub fn attempts(&self, device_id: &DeviceId) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attempts
            .get(device_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn send(&self, device_id: &DeviceId, _payload: &str) -> Result<(), TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state.attempts.entry(device_id.clone()).or_insert(0) += 1;

        let outcome = match state.failures.get_mut(device_id) {
            Some(FailurePlan::Always(error)) => Err(error.clone()),
            Some(FailurePlan::Times { remaining, error }) if *remaining > 0 => {
                *remaining -= 1;
                Err(error.clone())
            }
            _ => Ok(()),
        };

        if outcome.is_ok() {
            state.sent.push(device_id.clone());
        }
        outcome
    }
}

// ============================================================================
// MOCK STATUS SOURCE
// ============================================================================

#[derive(Debug, Default)]
struct StatusState {
    /// Per-device sequence of statuses; the last one is sticky.
    scripts: HashMap<DeviceId, VecDeque<DeviceStatusUpdate>>,
    fail_next: u32,
}

/// Scriptable [`DeviceStatusSource`] double.
///
/// Each device gets a sequence of status updates; every poll that includes
/// the device advances its script by one step, and the final step repeats
/// forever (the source models a current-status table, so re-reads are
/// duplicates by design). Devices with no script never report.
#[derive(Debug, Default)]
pub struct MockStatusSource {
    state: Mutex<StatusState>,
    polls: AtomicU64,
}

impl MockStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status sequence for one device.
    pub fn script(&self, device_id: &DeviceId, statuses: Vec<DeviceResultStatus>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.scripts.insert(
            device_id.clone(),
            statuses
                .into_iter()
                .map(|status| DeviceStatusUpdate {
                    device_id: device_id.clone(),
                    status,
                    detail: None,
                })
                .collect(),
        );
    }

    /// Script one terminal report with a detail string.
    pub fn script_terminal(
        &self,
        device_id: &DeviceId,
        status: DeviceResultStatus,
        detail: &str,
    ) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.scripts.insert(
            device_id.clone(),
            VecDeque::from([DeviceStatusUpdate {
                device_id: device_id.clone(),
                status,
                detail: Some(detail.to_string()),
            }]),
        );
    }

    /// The next `n` polls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_next = n;
    }

    /// Number of poll calls served (including failed ones).
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeviceStatusSource for MockStatusSource {
    async fn poll(
        &self,
        _exec_id: ExecutionId,
        device_ids: &[DeviceId],
    ) -> Result<Vec<DeviceStatusUpdate>, StatusSourceError> {
        self.polls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(StatusSourceError::new("status table unavailable"));
        }

        let mut updates = Vec::new();
        for device_id in device_ids {
            if let Some(script) = state.scripts.get_mut(device_id) {
                let update = if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                };
                if let Some(update) = update {
                    updates.push(update);
                }
            }
        }
        Ok(updates)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use drover_core::{DeviceId, DeviceRecord};
    use std::collections::HashMap;

    /// A registry record with no installed packages.
    pub fn device(id: &str, alias: &str, online: bool) -> DeviceRecord {
        DeviceRecord {
            device_id: DeviceId::new(id),
            alias: alias.to_string(),
            online,
            last_seen: Some(chrono::Utc::now()),
            installed_versions: HashMap::new(),
        }
    }

    /// A registry record with one installed package version.
    pub fn device_with_version(
        id: &str,
        alias: &str,
        package: &str,
        version_code: i64,
    ) -> DeviceRecord {
        let mut record = device(id, alias, true);
        record
            .installed_versions
            .insert(package.to_string(), version_code);
        record
    }

    /// A fleet of `n` online devices with predictable ids (`d-000`...).
    pub fn fleet(n: usize) -> Vec<DeviceRecord> {
        (0..n)
            .map(|i| device(&format!("d-{i:03}"), &format!("alias-{i:03}"), true))
            .collect()
    }
}
