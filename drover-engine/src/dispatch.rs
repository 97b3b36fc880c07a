//! Dispatch batcher
//!
//! Fans one execution's resolved device set out through the push transport.
//! The set is chunked into bounded batches; batches run concurrently with
//! each other and every device within a batch is sent concurrently, so
//! batching only bounds the burst size per wave of transport calls. Each
//! device-level call gets its own retry/backoff budget and its own timeout.
//!
//! Cancellation is cooperative: the flag is checked before every send and
//! before every retry, and a send that completes after cancellation has its
//! result recorded on the row but discarded from the frozen aggregate.

use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use drover_core::{DeviceId, DeviceResultStatus, PushTransport, TransportError};
use drover_storage::ExecutionRecord;
use futures_util::future::join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Tally of one `dispatch_all` run, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batches: usize,
    pub sent: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Sent,
    Failed,
    Cancelled,
}

/// Concurrent batched fan-out over a [`PushTransport`].
pub struct DispatchBatcher {
    transport: Arc<dyn PushTransport>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl DispatchBatcher {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        config: EngineConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            transport,
            config,
            metrics,
        }
    }

    /// Dispatch `payload` to every device, `ceil(n / batch_size)` batches.
    ///
    /// Per-device failures are recorded on the execution record and never
    /// abort the run; the report only summarizes what happened.
    pub async fn dispatch_all(
        &self,
        record: &Arc<ExecutionRecord>,
        device_ids: &[DeviceId],
        payload: &str,
    ) -> BatchReport {
        let batch_size = self.config.batch_size.max(1);
        let payload: Arc<str> = Arc::from(payload);
        let exec_id = record.exec_id();

        let mut handles = Vec::new();
        for (batch_index, batch) in device_ids.chunks(batch_size).enumerate() {
            let batch: Vec<DeviceId> = batch.to_vec();
            let record = Arc::clone(record);
            let payload = Arc::clone(&payload);
            let transport = Arc::clone(&self.transport);
            let metrics = Arc::clone(&self.metrics);
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                tracing::debug!(
                    exec_id = %exec_id,
                    batch_index,
                    batch_len = batch.len(),
                    "Dispatching batch"
                );
                let outcomes = join_all(batch.iter().map(|device_id| {
                    dispatch_one(&record, &transport, &config, &metrics, device_id, &payload)
                }))
                .await;

                let mut tally = BatchReport {
                    batches: 1,
                    ..BatchReport::default()
                };
                for outcome in outcomes {
                    match outcome {
                        SendOutcome::Sent => tally.sent += 1,
                        SendOutcome::Failed => tally.failed += 1,
                        SendOutcome::Cancelled => tally.cancelled += 1,
                    }
                }
                tally
            }));
        }

        let mut report = BatchReport::default();
        for handle in join_all(handles).await {
            match handle {
                Ok(tally) => {
                    report.batches += tally.batches;
                    report.sent += tally.sent;
                    report.failed += tally.failed;
                    report.cancelled += tally.cancelled;
                }
                Err(e) => {
                    tracing::error!(exec_id = %exec_id, error = %e, "Dispatch batch task panicked");
                }
            }
        }

        tracing::info!(
            exec_id = %exec_id,
            batches = report.batches,
            sent = report.sent,
            failed = report.failed,
            cancelled = report.cancelled,
            "Dispatch complete"
        );
        report
    }
}

/// Send to one device with retry, backoff, and cancellation checks.
async fn dispatch_one(
    record: &ExecutionRecord,
    transport: &Arc<dyn PushTransport>,
    config: &EngineConfig,
    metrics: &EngineMetrics,
    device_id: &DeviceId,
    payload: &str,
) -> SendOutcome {
    let mut attempt = 1u32;
    loop {
        if record.is_cancelled() {
            record.apply_status(
                device_id,
                DeviceResultStatus::Cancelled,
                Some("cancelled before dispatch".to_string()),
            );
            return SendOutcome::Cancelled;
        }

        EngineMetrics::incr(&metrics.send_attempts);
        let result = match tokio::time::timeout(
            config.send_timeout,
            transport.send(device_id, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                device_id: device_id.clone(),
            }),
        };

        match result {
            Ok(()) => {
                // A send that lands after cancellation is discarded from the
                // aggregate; the row records why the device never ran.
                if record.is_cancelled() || !record.mark_sent(device_id) {
                    record.apply_status(
                        device_id,
                        DeviceResultStatus::Cancelled,
                        Some("cancelled during dispatch".to_string()),
                    );
                    return SendOutcome::Cancelled;
                }
                return SendOutcome::Sent;
            }
            Err(error) if attempt < config.retry.max_attempts => {
                tracing::debug!(
                    device_id = %device_id,
                    attempt,
                    error = %error,
                    "Transport send failed, retrying"
                );
                tokio::time::sleep(jittered(config.retry.backoff_for(attempt))).await;
                attempt += 1;
            }
            Err(error) => {
                tracing::warn!(
                    device_id = %device_id,
                    attempts = attempt,
                    error = %error,
                    "Transport send failed, giving up"
                );
                EngineMetrics::incr(&metrics.send_failures);
                record.apply_status(
                    device_id,
                    DeviceResultStatus::Failed,
                    Some(error.reason_code().to_string()),
                );
                return SendOutcome::Failed;
            }
        }
    }
}

/// Spread retries out a little so a failing batch does not retry in
/// lock-step.
fn jittered(delay: Duration) -> Duration {
    let factor: f32 = rand::rng().random_range(0.8..1.2);
    delay.mul_f32(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{new_execution_id, Execution, ExecutionMode, TargetSpec};
    use drover_storage::ExecutionStore;
    use drover_test_utils::MockPushTransport;

    fn record_with_devices(n: usize) -> (Arc<ExecutionRecord>, Vec<DeviceId>) {
        let store = ExecutionStore::new();
        let record = store.create(Execution::new(
            new_execution_id(),
            ExecutionMode::PushPayload,
            TargetSpec::All { online_only: false },
            "payload",
            "tests",
        ));
        let ids: Vec<DeviceId> = (0..n)
            .map(|i| {
                let id = DeviceId::new(format!("d-{i:03}"));
                record.add_pending(id.clone(), format!("alias-{i}"));
                id
            })
            .collect();
        (record, ids)
    }

    fn batcher(transport: Arc<MockPushTransport>) -> DispatchBatcher {
        DispatchBatcher::new(
            transport,
            EngineConfig::development(),
            Arc::new(EngineMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_batch_completeness() {
        // 15 devices with batch size 4: ceil(15/4) = 4 batches whose union
        // is the whole set, no duplicates.
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(15);
        let report = batcher(Arc::clone(&transport))
            .dispatch_all(&record, &ids, "payload")
            .await;

        assert_eq!(report.batches, 4);
        assert_eq!(report.sent, 15);
        assert_eq!(report.failed, 0);

        let mut sent = transport.sent_devices();
        sent.sort();
        sent.dedup();
        assert_eq!(sent.len(), 15);
        assert_eq!(record.snapshot().sent_count, 15);
        assert_eq!(record.device_results().len(), 15);
    }

    #[tokio::test]
    async fn test_transport_failure_marks_failed_not_sent() {
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(3);
        transport.fail_always(
            &ids[1],
            TransportError::NoChannel {
                device_id: ids[1].clone(),
            },
        );

        let report = batcher(Arc::clone(&transport))
            .dispatch_all(&record, &ids, "payload")
            .await;
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);

        let counters = record.snapshot();
        assert_eq!(counters.sent_count, 2);
        assert_eq!(counters.error_count, 1);
        let failed_row = record
            .device_results()
            .into_iter()
            .find(|r| r.device_id == ids[1])
            .unwrap();
        assert_eq!(failed_row.status, DeviceResultStatus::Failed);
        assert_eq!(failed_row.detail.as_deref(), Some("no registered channel"));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(1);
        // First attempt fails, the retry succeeds (development config
        // allows 2 attempts).
        transport.fail_times(
            &ids[0],
            1,
            TransportError::Rejected {
                device_id: ids[0].clone(),
                reason: "backend hiccup".to_string(),
            },
        );

        let report = batcher(Arc::clone(&transport))
            .dispatch_all(&record, &ids, "payload")
            .await;
        assert_eq!(report.sent, 1);
        assert_eq!(transport.attempts(&ids[0]), 2);
        assert_eq!(record.snapshot().sent_count, 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(1);
        transport.fail_always(
            &ids[0],
            TransportError::Rejected {
                device_id: ids[0].clone(),
                reason: "quota".to_string(),
            },
        );

        let report = batcher(Arc::clone(&transport))
            .dispatch_all(&record, &ids, "payload")
            .await;
        assert_eq!(report.failed, 1);
        assert_eq!(transport.attempts(&ids[0]), 2);
        assert_eq!(record.snapshot().error_count, 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_dispatch() {
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(20);

        // Cancel before dispatch: nothing may transition Pending -> Sent.
        record.request_cancel();
        record.freeze_counters();
        let report = batcher(Arc::clone(&transport))
            .dispatch_all(&record, &ids, "payload")
            .await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.cancelled, 20);
        assert!(transport.sent_devices().is_empty());
        assert_eq!(record.snapshot().sent_count, 0);
        assert!(record
            .device_results()
            .iter()
            .all(|r| r.status == DeviceResultStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_single_batch_when_fewer_than_batch_size() {
        let transport = Arc::new(MockPushTransport::new());
        let (record, ids) = record_with_devices(3);
        let report = batcher(transport)
            .dispatch_all(&record, &ids, "payload")
            .await;
        assert_eq!(report.batches, 1);
        assert_eq!(report.sent, 3);
    }
}
