//! Engine metrics
//!
//! Process-lifetime counters for dispatch and polling activity. Exposed
//! through the health surface; no exporter is wired here.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking engine activity since startup.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Executions started (dry runs excluded)
    pub executions_started: AtomicU64,

    /// Executions that reached `completed`
    pub executions_completed: AtomicU64,

    /// Executions that were cancelled
    pub executions_cancelled: AtomicU64,

    /// Individual transport send attempts, including retries
    pub send_attempts: AtomicU64,

    /// Devices whose dispatch exhausted all retries
    pub send_failures: AtomicU64,

    /// Poll cycles run across all executions
    pub poll_cycles: AtomicU64,

    /// Poll cycles whose status-source query failed
    pub poll_errors: AtomicU64,

    /// Devices force-marked `timeout` at the end of the window
    pub devices_timed_out: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions_started: self.executions_started.load(Ordering::Relaxed),
            executions_completed: self.executions_completed.load(Ordering::Relaxed),
            executions_cancelled: self.executions_cancelled.load(Ordering::Relaxed),
            send_attempts: self.send_attempts.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            devices_timed_out: self.devices_timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub executions_started: u64,
    pub executions_completed: u64,
    pub executions_cancelled: u64,
    pub send_attempts: u64,
    pub send_failures: u64,
    pub poll_cycles: u64,
    pub poll_errors: u64,
    pub devices_timed_out: u64,
}
