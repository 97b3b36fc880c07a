//! Acknowledgement aggregator
//!
//! Single entry point for device status observations, whether pushed by a
//! device callback or read by the supervisor's poll loop. All transitions
//! run through [`ExecutionRecord::apply_status`], which owns the
//! exactly-once counter contract; this layer adds lookup, logging, and
//! idempotent handling of duplicates.

use drover_core::{DeviceStatusUpdate, DroverResult, ExecutionId};
use drover_storage::{ApplyOutcome, ExecutionRecord, ExecutionStore};
use std::sync::Arc;

/// Folds status updates into per-execution result tables and counters.
pub struct AckAggregator {
    executions: Arc<ExecutionStore>,
}

impl AckAggregator {
    pub fn new(executions: Arc<ExecutionStore>) -> Self {
        Self { executions }
    }

    /// Apply one update for `(exec_id, device_id)`. Duplicate terminal
    /// deliveries and out-of-order non-terminal stragglers are absorbed
    /// silently; unknown devices are reported for caller-side 404s.
    pub fn apply(&self, exec_id: ExecutionId, update: &DeviceStatusUpdate) -> DroverResult<ApplyOutcome> {
        let record = self.executions.get(exec_id)?;
        Ok(self.apply_to_record(&record, update))
    }

    /// Apply one update against an already-resolved execution record.
    pub fn apply_to_record(
        &self,
        record: &ExecutionRecord,
        update: &DeviceStatusUpdate,
    ) -> ApplyOutcome {
        let outcome =
            record.apply_status(&update.device_id, update.status, update.detail.clone());
        match outcome {
            ApplyOutcome::FirstTerminal => {
                tracing::debug!(
                    exec_id = %record.exec_id(),
                    device_id = %update.device_id,
                    status = %update.status,
                    "Device reached terminal state"
                );
            }
            ApplyOutcome::Progressed => {
                tracing::trace!(
                    exec_id = %record.exec_id(),
                    device_id = %update.device_id,
                    status = %update.status,
                    "Device progress update"
                );
            }
            ApplyOutcome::Duplicate | ApplyOutcome::Refused => {
                tracing::trace!(
                    exec_id = %record.exec_id(),
                    device_id = %update.device_id,
                    status = %update.status,
                    outcome = ?outcome,
                    "Status update ignored"
                );
            }
            ApplyOutcome::UnknownDevice => {
                tracing::warn!(
                    exec_id = %record.exec_id(),
                    device_id = %update.device_id,
                    "Status update for device outside the execution"
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{
        new_execution_id, DeviceId, DeviceResultStatus, DroverError, Execution, ExecutionMode,
        TargetSpec,
    };

    fn setup() -> (Arc<ExecutionStore>, AckAggregator, ExecutionId, DeviceId) {
        let store = Arc::new(ExecutionStore::new());
        let record = store.create(Execution::new(
            new_execution_id(),
            ExecutionMode::RestrictedShell,
            TargetSpec::All { online_only: false },
            "reboot",
            "tests",
        ));
        let device = DeviceId::new("d-1");
        record.add_pending(device.clone(), "kiosk-1");
        record.mark_sent(&device);
        let exec_id = record.exec_id();
        (Arc::clone(&store), AckAggregator::new(store), exec_id, device)
    }

    fn update(device: &DeviceId, status: DeviceResultStatus) -> DeviceStatusUpdate {
        DeviceStatusUpdate {
            device_id: device.clone(),
            status,
            detail: None,
        }
    }

    #[test]
    fn test_terminal_then_duplicate() {
        let (store, aggregator, exec_id, device) = setup();
        assert_eq!(
            aggregator
                .apply(exec_id, &update(&device, DeviceResultStatus::Completed))
                .unwrap(),
            ApplyOutcome::FirstTerminal
        );
        assert_eq!(
            aggregator
                .apply(exec_id, &update(&device, DeviceResultStatus::Completed))
                .unwrap(),
            ApplyOutcome::Duplicate
        );
        let counters = store.get(exec_id).unwrap().snapshot();
        assert_eq!(counters.acked_count, 1);
        assert_eq!(counters.error_count, 0);
    }

    #[test]
    fn test_progress_updates_do_not_touch_counters() {
        let (store, aggregator, exec_id, device) = setup();
        aggregator
            .apply(exec_id, &update(&device, DeviceResultStatus::Downloading))
            .unwrap();
        aggregator
            .apply(exec_id, &update(&device, DeviceResultStatus::Installing))
            .unwrap();
        let counters = store.get(exec_id).unwrap().snapshot();
        assert_eq!(counters.acked_count + counters.error_count, 0);
    }

    #[test]
    fn test_unknown_execution() {
        let (_store, aggregator, _exec_id, device) = setup();
        let err = aggregator
            .apply(
                new_execution_id(),
                &update(&device, DeviceResultStatus::Completed),
            )
            .unwrap_err();
        assert!(matches!(err, DroverError::Dispatch(_)));
    }

    #[test]
    fn test_unknown_device_reported() {
        let (_store, aggregator, exec_id, _device) = setup();
        let outcome = aggregator
            .apply(
                exec_id,
                &update(&DeviceId::new("ghost"), DeviceResultStatus::Completed),
            )
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::UnknownDevice);
    }
}
