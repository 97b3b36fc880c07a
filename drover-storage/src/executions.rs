//! Execution store
//!
//! The execution rows, their per-device result tables, and the aggregate
//! counters are the only shared mutable state in the engine. Every mutation
//! goes through the transition primitives here: device rows live in a
//! `DashMap` so each transition happens under that entry's lock, and the
//! counters are atomics bumped exactly once per terminal transition. A
//! plain read-then-write counter update is not possible through this API.

use chrono::Utc;
use dashmap::DashMap;
use drover_core::{
    CounterSnapshot, DeviceId, DeviceResult, DeviceResultStatus, DispatchError, DroverResult,
    Execution, ExecutionId, ExecutionReport, ExecutionStatus,
};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

// ============================================================================
// COUNTERS
// ============================================================================

/// Race-free aggregate counters for one execution.
#[derive(Debug, Default)]
pub struct ExecutionCounters {
    total_targets: AtomicI64,
    sent_count: AtomicI64,
    acked_count: AtomicI64,
    error_count: AtomicI64,
}

impl ExecutionCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_targets: self.total_targets.load(Ordering::Acquire),
            sent_count: self.sent_count.load(Ordering::Acquire),
            acked_count: self.acked_count.load(Ordering::Acquire),
            error_count: self.error_count.load(Ordering::Acquire),
        }
    }
}

// ============================================================================
// TRANSITION OUTCOME
// ============================================================================

/// What a status transition actually did. Callers use this for logging and
/// metrics; the counter bookkeeping has already happened by the time the
/// outcome is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Non-terminal progress update applied
    Progressed,
    /// First terminal transition for this device; one counter was
    /// incremented (unless counters were frozen by cancellation)
    FirstTerminal,
    /// Device already terminal; redelivery is a no-op
    Duplicate,
    /// Non-terminal update arrived after a terminal state; refused
    Refused,
    /// Device is not part of this execution
    UnknownDevice,
}

// ============================================================================
// EXECUTION RECORD
// ============================================================================

/// One live execution: metadata, per-device rows, counters, cancellation
/// flags. Shared as `Arc` between the supervisor, the dispatch batcher, the
/// aggregator, and API reads.
#[derive(Debug)]
pub struct ExecutionRecord {
    meta: RwLock<Execution>,
    results: DashMap<DeviceId, DeviceResult>,
    counters: ExecutionCounters,
    cancelled: AtomicBool,
    counters_frozen: AtomicBool,
}

impl ExecutionRecord {
    fn new(execution: Execution) -> Self {
        Self {
            meta: RwLock::new(execution),
            results: DashMap::new(),
            counters: ExecutionCounters::default(),
            cancelled: AtomicBool::new(false),
            counters_frozen: AtomicBool::new(false),
        }
    }

    pub fn exec_id(&self) -> ExecutionId {
        self.meta.read().unwrap_or_else(|e| e.into_inner()).exec_id
    }

    pub fn execution(&self) -> Execution {
        self.meta
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.meta.read().unwrap_or_else(|e| e.into_inner()).status
    }

    /// Transition the execution status, stamping `finished_at` on terminal
    /// states.
    pub fn set_status(&self, status: ExecutionStatus) {
        let mut meta = self.meta.write().unwrap_or_else(|e| e.into_inner());
        meta.status = status;
        if status.is_terminal() {
            meta.finished_at = Some(Utc::now());
        }
    }

    /// Register one targeted device. Idempotent per device; the total
    /// counter is bumped only on first registration.
    pub fn add_pending(&self, device_id: DeviceId, alias: impl Into<String>) {
        let mut inserted = false;
        self.results.entry(device_id.clone()).or_insert_with(|| {
            inserted = true;
            DeviceResult::pending(device_id, alias)
        });
        if inserted {
            self.counters.total_targets.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Record a successful transport call: `Pending -> Sent`. Refused (and
    /// `false` returned) if the row has already moved on, or once counters
    /// are frozen by cancellation.
    pub fn mark_sent(&self, device_id: &DeviceId) -> bool {
        if self.counters_frozen.load(Ordering::Acquire) {
            return false;
        }
        match self.results.get_mut(device_id) {
            Some(mut row) if row.status == DeviceResultStatus::Pending => {
                row.status = DeviceResultStatus::Sent;
                row.updated_at = Utc::now();
                self.counters.sent_count.fetch_add(1, Ordering::AcqRel);
                true
            }
            _ => false,
        }
    }

    /// Apply one status observation for a device.
    ///
    /// Invariants enforced under the row's entry lock:
    /// - a terminal status is never overwritten by a non-terminal one
    /// - the first terminal transition increments exactly one of
    ///   `acked_count` / `error_count`; redeliveries are no-ops
    /// - no counter moves after `freeze_counters()`
    pub fn apply_status(
        &self,
        device_id: &DeviceId,
        status: DeviceResultStatus,
        detail: Option<String>,
    ) -> ApplyOutcome {
        let Some(mut row) = self.results.get_mut(device_id) else {
            return ApplyOutcome::UnknownDevice;
        };

        if row.status.is_terminal() {
            return if status.is_terminal() {
                ApplyOutcome::Duplicate
            } else {
                ApplyOutcome::Refused
            };
        }

        row.status = status;
        if detail.is_some() {
            row.detail = detail;
        }
        row.updated_at = Utc::now();

        if !status.is_terminal() {
            return ApplyOutcome::Progressed;
        }

        if !self.counters_frozen.load(Ordering::Acquire) {
            if status.is_success() {
                self.counters.acked_count.fetch_add(1, Ordering::AcqRel);
            } else {
                self.counters.error_count.fetch_add(1, Ordering::AcqRel);
            }
        }
        ApplyOutcome::FirstTerminal
    }

    /// Cooperative cancellation flag, checked by the dispatch batcher before
    /// every device-level send and by the poll loop at the top of each cycle.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop all further counter movement. Called at the instant of
    /// cancellation, before outstanding rows are swept, so that late
    /// in-flight outcomes are recorded on the rows but discarded from the
    /// aggregate.
    pub fn freeze_counters(&self) {
        self.counters_frozen.store(true, Ordering::Release);
    }

    /// Sweep every non-terminal row to `Cancelled`. Counters must already be
    /// frozen. Returns the number of rows swept.
    pub fn cancel_outstanding(&self, detail: &str) -> usize {
        self.sweep(DeviceResultStatus::Cancelled, detail)
    }

    /// Sweep every non-terminal row to `Timeout` at the end of the polling
    /// window. Counters are live here: each swept device counts as an error.
    pub fn finalize_timeouts(&self, detail: &str) -> usize {
        self.sweep(DeviceResultStatus::Timeout, detail)
    }

    fn sweep(&self, status: DeviceResultStatus, detail: &str) -> usize {
        let ids: Vec<DeviceId> = self
            .results
            .iter()
            .filter(|row| !row.status.is_terminal())
            .map(|row| row.device_id.clone())
            .collect();
        let mut swept = 0;
        for device_id in ids {
            if self.apply_status(&device_id, status, Some(detail.to_string()))
                == ApplyOutcome::FirstTerminal
            {
                swept += 1;
            }
        }
        swept
    }

    /// Device ids not yet in a terminal state, sorted for deterministic
    /// polling.
    pub fn outstanding(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .results
            .iter()
            .filter(|row| !row.status.is_terminal())
            .map(|row| row.device_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// All device rows, sorted by device id.
    pub fn device_results(&self) -> Vec<DeviceResult> {
        let mut rows: Vec<DeviceResult> =
            self.results.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        rows
    }

    pub fn report(&self) -> ExecutionReport {
        ExecutionReport {
            execution: self.execution(),
            counters: self.snapshot(),
            device_results: self.device_results(),
        }
    }
}

// ============================================================================
// EXECUTION STORE
// ============================================================================

/// All executions, live and finished. Executions are retained after
/// completion for audit; nothing here deletes them.
#[derive(Debug, Default)]
pub struct ExecutionStore {
    executions: DashMap<ExecutionId, Arc<ExecutionRecord>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, execution: Execution) -> Arc<ExecutionRecord> {
        let record = Arc::new(ExecutionRecord::new(execution));
        self.executions.insert(record.exec_id(), Arc::clone(&record));
        record
    }

    pub fn get(&self, exec_id: ExecutionId) -> DroverResult<Arc<ExecutionRecord>> {
        self.executions
            .get(&exec_id)
            .map(|r| Arc::clone(&r))
            .ok_or_else(|| DispatchError::ExecutionNotFound { exec_id }.into())
    }

    /// Execution rows newest first.
    pub fn list(&self) -> Vec<Execution> {
        let mut executions: Vec<Execution> =
            self.executions.iter().map(|r| r.execution()).collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        executions
    }
}
