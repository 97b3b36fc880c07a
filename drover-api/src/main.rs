//! DROVER API Server Entry Point
//!
//! Bootstraps telemetry and configuration, wires the in-memory stores and
//! the push transport, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use drover_api::telemetry::{init_tracing, TelemetryConfig};
use drover_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig,
    CallbackOnlyStatusSource, HttpPushTransport, LoopbackTransport,
};
use drover_core::{DeviceRecord, DeviceStatusSource, PushTransport};
use drover_engine::{
    EngineConfig, EngineMetrics, ExecutionSupervisor, RolloutController,
};
use drover_storage::{
    BuildStore, DeviceRegistry, ExecutionStore, InMemoryBuildStore, InMemoryDeviceRegistry,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let engine_config = EngineConfig::from_env();
    let auth_config = AuthConfig::from_env();
    if auth_config.is_open() {
        tracing::warn!("No API keys configured; running open (development mode)");
    }

    let registry = build_registry(&api_config)?;
    let builds: Arc<dyn BuildStore> = Arc::new(InMemoryBuildStore::new());
    let executions = Arc::new(ExecutionStore::new());
    let metrics = Arc::new(EngineMetrics::new());

    let transport = build_transport(&api_config)?;
    let status_source: Arc<dyn DeviceStatusSource> = Arc::new(CallbackOnlyStatusSource);

    let rollout = Arc::new(RolloutController::new(
        Arc::clone(&builds),
        api_config.download_base.clone(),
    ));
    let supervisor = Arc::new(ExecutionSupervisor::new(
        Arc::clone(&registry),
        transport,
        status_source,
        Arc::clone(&executions),
        engine_config,
        Arc::clone(&metrics),
    ));

    let state = AppState {
        supervisor,
        rollout,
        registry,
        builds,
        executions,
        metrics,
        auth: Arc::new(auth_config),
        start_time: std::time::Instant::now(),
    };

    let app: Router = create_api_router(state, &api_config)?;

    let addr = resolve_bind_addr(&api_config)?;
    tracing::info!(%addr, "Starting DROVER API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

/// Seed the in-memory registry from a JSON file when configured.
fn build_registry(config: &ApiConfig) -> ApiResult<Arc<dyn DeviceRegistry>> {
    let registry = match &config.registry_seed_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ApiError::internal_error(format!("Failed to read registry seed {path}: {e}"))
            })?;
            let devices: Vec<DeviceRecord> = serde_json::from_str(&raw).map_err(|e| {
                ApiError::internal_error(format!("Invalid registry seed {path}: {e}"))
            })?;
            tracing::info!(path = %path, devices = devices.len(), "Registry seeded from file");
            InMemoryDeviceRegistry::seeded(devices)
        }
        None => {
            tracing::warn!("No registry seed configured; registry starts empty");
            InMemoryDeviceRegistry::new()
        }
    };
    Ok(Arc::new(registry))
}

fn build_transport(config: &ApiConfig) -> ApiResult<Arc<dyn PushTransport>> {
    match &config.push_gateway_url {
        Some(url) => {
            tracing::info!(gateway = %url, "Using HTTP push gateway transport");
            let transport = HttpPushTransport::new(url.clone(), config.push_timeout)
                .map_err(|e| {
                    ApiError::internal_error(format!("Failed to build push client: {e}"))
                })?;
            Ok(Arc::new(transport))
        }
        None => {
            tracing::warn!("No push gateway configured; using loopback transport");
            Ok(Arc::new(LoopbackTransport))
        }
    }
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    let addr = format!("{}:{}", config.bind_host, config.port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
