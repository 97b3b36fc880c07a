//! Execution supervisor
//!
//! Runs one execution end to end: validate, resolve targets, dispatch in
//! batches, then poll the device status source at a fixed interval until
//! every device row is terminal, the global window elapses (stragglers are
//! marked `timeout`), or the run is cancelled. The poll loop is a
//! server-owned timed task with a cooperative cancellation channel; it is
//! not tied to any client connection and survives UI disconnects.
//!
//! One poll loop covers all batches of an execution, and executions are
//! isolated from each other: each gets its own record, its own loop, and
//! its own cancel signal.

use crate::aggregator::AckAggregator;
use crate::config::EngineConfig;
use crate::dispatch::DispatchBatcher;
use crate::metrics::EngineMetrics;
use crate::resolver::TargetResolver;
use dashmap::DashMap;
use drover_core::{
    new_execution_id, DeviceId, DeviceStatusSource, DispatchError, DroverResult, Execution,
    ExecutionId, ExecutionMode, ExecutionReport, ExecutionStatus, PushTransport, TargetPreview,
    TargetSpec, ValidationError,
};
use drover_storage::{DeviceRegistry, ExecutionRecord, ExecutionStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Input for starting (or previewing) one execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub mode: ExecutionMode,
    pub target_spec: TargetSpec,
    pub payload: String,
    pub created_by: String,
}

/// Synchronous response to `execute`: dispatch has finished, polling is
/// running in the background.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStarted {
    pub exec_id: ExecutionId,
    pub total_targets: i64,
    pub sent_count: i64,
    /// Explicit-list entries that matched no device id or alias
    pub unresolved: Vec<String>,
}

/// Orchestrates executions over the resolver, batcher, aggregator, and
/// status source.
pub struct ExecutionSupervisor {
    resolver: TargetResolver,
    batcher: DispatchBatcher,
    executions: Arc<ExecutionStore>,
    status_source: Arc<dyn DeviceStatusSource>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    cancel_signals: Arc<DashMap<ExecutionId, watch::Sender<bool>>>,
}

impl ExecutionSupervisor {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        transport: Arc<dyn PushTransport>,
        status_source: Arc<dyn DeviceStatusSource>,
        executions: Arc<ExecutionStore>,
        config: EngineConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            resolver: TargetResolver::new(registry),
            batcher: DispatchBatcher::new(transport, config.clone(), Arc::clone(&metrics)),
            executions,
            status_source,
            config,
            metrics,
            cancel_signals: Arc::new(DashMap::new()),
        }
    }

    /// Dry-run: validate and resolve only. No execution row is created and
    /// nothing is dispatched.
    pub async fn preview(&self, request: &ExecutionRequest) -> DroverResult<TargetPreview> {
        self.validate(request)?;
        self.resolver
            .preview(&request.target_spec, self.config.preview_sample)
            .await
    }

    /// Start one execution. Validation and resolution failures reject the
    /// whole run synchronously; from dispatch onward, per-device failures
    /// only ever land in the result table.
    pub async fn execute(&self, request: ExecutionRequest) -> DroverResult<ExecutionStarted> {
        self.validate(&request)?;

        let resolved = self.resolver.resolve(&request.target_spec).await?;
        if resolved.is_empty() {
            return Err(ValidationError::EmptyTargetSet.into());
        }

        let execution = Execution::new(
            new_execution_id(),
            request.mode,
            request.target_spec.clone(),
            request.payload.clone(),
            request.created_by.clone(),
        );
        let exec_id = execution.exec_id;
        let record = self.executions.create(execution);
        for device in &resolved.devices {
            record.add_pending(device.device_id.clone(), device.alias.clone());
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_signals.insert(exec_id, cancel_tx);
        EngineMetrics::incr(&self.metrics.executions_started);

        tracing::info!(
            exec_id = %exec_id,
            mode = %request.mode,
            targets = resolved.devices.len(),
            unresolved = resolved.unresolved.len(),
            created_by = %request.created_by,
            "Execution starting"
        );

        // All batches go out before polling begins; the poll loop then
        // covers every batch of this execution.
        record.set_status(ExecutionStatus::Running);
        let device_ids: Vec<DeviceId> = resolved
            .devices
            .iter()
            .map(|d| d.device_id.clone())
            .collect();
        self.batcher
            .dispatch_all(&record, &device_ids, &request.payload)
            .await;

        let snapshot = record.snapshot();
        self.spawn_poll_loop(Arc::clone(&record), cancel_rx);

        Ok(ExecutionStarted {
            exec_id,
            total_targets: snapshot.total_targets,
            sent_count: snapshot.sent_count,
            unresolved: resolved.unresolved,
        })
    }

    /// Request cancellation of a pending or running execution. Counters
    /// freeze immediately; the poll loop reclassifies outstanding rows on
    /// its next cycle.
    pub fn cancel(&self, exec_id: ExecutionId) -> DroverResult<()> {
        let record = self.executions.get(exec_id)?;
        let status = record.status();
        if status.is_terminal() {
            return Err(DispatchError::NotCancellable { exec_id, status }.into());
        }

        record.request_cancel();
        record.freeze_counters();
        if let Some(signal) = self.cancel_signals.get(&exec_id) {
            let _ = signal.send(true);
        }
        tracing::info!(exec_id = %exec_id, "Cancellation requested");
        Ok(())
    }

    /// Current report: execution row, counters, per-device results.
    pub fn get_status(&self, exec_id: ExecutionId) -> DroverResult<ExecutionReport> {
        Ok(self.executions.get(exec_id)?.report())
    }

    /// All executions, newest first.
    pub fn list(&self) -> Vec<Execution> {
        self.executions.list()
    }

    fn validate(&self, request: &ExecutionRequest) -> DroverResult<()> {
        if request.payload.trim().is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        if request.mode == ExecutionMode::RestrictedShell {
            let command = request
                .payload
                .split_whitespace()
                .next()
                .unwrap_or_default();
            if !self
                .config
                .allowed_commands
                .iter()
                .any(|allowed| allowed == command)
            {
                return Err(ValidationError::DisallowedCommand {
                    reason: format!("'{command}' is not on the allow-list"),
                }
                .into());
            }
        }
        Ok(())
    }

    fn spawn_poll_loop(&self, record: Arc<ExecutionRecord>, cancel_rx: watch::Receiver<bool>) {
        let status_source = Arc::clone(&self.status_source);
        let aggregator = AckAggregator::new(Arc::clone(&self.executions));
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);
        let cancel_signals = Arc::clone(&self.cancel_signals);

        tokio::spawn(async move {
            let exec_id = record.exec_id();
            poll_until_terminal(&record, &status_source, &aggregator, &config, &metrics, cancel_rx)
                .await;
            cancel_signals.remove(&exec_id);
        });
    }
}

/// The poll loop: fixed interval, skipped (not compressed) missed ticks,
/// global deadline, cooperative cancellation. Transient status-source
/// failures are logged and retried on the next tick without accelerating
/// the interval.
async fn poll_until_terminal(
    record: &Arc<ExecutionRecord>,
    status_source: &Arc<dyn DeviceStatusSource>,
    aggregator: &AckAggregator,
    config: &EngineConfig,
    metrics: &EngineMetrics,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let exec_id = record.exec_id();
    let deadline = Instant::now() + config.global_timeout;
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cancel_open = true;

    loop {
        tokio::select! {
            changed = cancel_rx.changed(), if cancel_open => {
                match changed {
                    Ok(()) if *cancel_rx.borrow() => {
                        finalize_cancelled(record, metrics);
                        return;
                    }
                    Ok(()) => {}
                    // Sender gone: rely on the per-tick cancellation check.
                    Err(_) => cancel_open = false,
                }
            }

            _ = ticker.tick() => {
                if record.is_cancelled() {
                    finalize_cancelled(record, metrics);
                    return;
                }

                let outstanding = record.outstanding();
                if outstanding.is_empty() {
                    finalize_completed(record, metrics, 0);
                    return;
                }

                if Instant::now() >= deadline {
                    let timed_out = record.finalize_timeouts("no report within polling window");
                    finalize_completed(record, metrics, timed_out);
                    return;
                }

                EngineMetrics::incr(&metrics.poll_cycles);
                match status_source.poll(exec_id, &outstanding).await {
                    Ok(updates) => {
                        for update in &updates {
                            aggregator.apply_to_record(record, update);
                        }
                        if record.outstanding().is_empty() {
                            finalize_completed(record, metrics, 0);
                            return;
                        }
                    }
                    Err(error) => {
                        // Transient; keep the interval, try again next tick.
                        EngineMetrics::incr(&metrics.poll_errors);
                        tracing::warn!(
                            exec_id = %exec_id,
                            error = %error,
                            "Status poll failed, retrying next cycle"
                        );
                    }
                }
            }
        }
    }
}

fn finalize_completed(record: &ExecutionRecord, metrics: &EngineMetrics, timed_out: usize) {
    if timed_out > 0 {
        EngineMetrics::add(&metrics.devices_timed_out, timed_out as u64);
    }
    record.set_status(ExecutionStatus::Completed);
    EngineMetrics::incr(&metrics.executions_completed);
    let counters = record.snapshot();
    tracing::info!(
        exec_id = %record.exec_id(),
        acked = counters.acked_count,
        errors = counters.error_count,
        timed_out,
        "Execution completed"
    );
}

fn finalize_cancelled(record: &ExecutionRecord, metrics: &EngineMetrics) {
    // Counters were frozen when cancellation was requested; the sweep only
    // reclassifies rows.
    let swept = record.cancel_outstanding("execution cancelled");
    record.set_status(ExecutionStatus::Cancelled);
    EngineMetrics::incr(&metrics.executions_cancelled);
    tracing::info!(
        exec_id = %record.exec_id(),
        swept,
        "Execution cancelled"
    );
}
