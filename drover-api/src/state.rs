//! Shared application state for Axum routers.

use std::sync::Arc;

use drover_engine::{EngineMetrics, ExecutionSupervisor, RolloutController};
use drover_storage::{BuildStore, DeviceRegistry, ExecutionStore};

use crate::auth::AuthConfig;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Execution orchestration: preview, execute, cancel, status.
    pub supervisor: Arc<ExecutionSupervisor>,
    /// Build promotion, rollout adjustment, rollback, manifest checks.
    pub rollout: Arc<RolloutController>,
    /// Read-only registry view for dashboard listings.
    pub registry: Arc<dyn DeviceRegistry>,
    /// Build rows for upload/list endpoints.
    pub builds: Arc<dyn BuildStore>,
    /// Execution rows for listing.
    pub executions: Arc<ExecutionStore>,
    /// Engine activity counters, surfaced through /health.
    pub metrics: Arc<EngineMetrics>,
    pub auth: Arc<AuthConfig>,
    pub start_time: std::time::Instant,
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(Arc<ExecutionSupervisor>, supervisor);
crate::impl_from_ref!(Arc<RolloutController>, rollout);
crate::impl_from_ref!(Arc<dyn DeviceRegistry>, registry);
crate::impl_from_ref!(Arc<dyn BuildStore>, builds);
crate::impl_from_ref!(Arc<ExecutionStore>, executions);
crate::impl_from_ref!(Arc<EngineMetrics>, metrics);
crate::impl_from_ref!(Arc<AuthConfig>, auth);
crate::impl_from_ref!(std::time::Instant, start_time);
