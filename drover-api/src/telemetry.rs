//! Tracing subscriber bootstrap
//!
//! Structured logging for the API binary: `EnvFilter`-driven levels with an
//! optional JSON output mode for log shipping. Exporter backends are out of
//! scope; everything observable flows through `tracing` events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub default_filter: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: std::env::var("DROVER_LOG")
                .unwrap_or_else(|_| "info,drover_engine=debug".to_string()),
            json_output: std::env::var("DROVER_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Call once at startup before any tracing occurs. `RUST_LOG` overrides the
/// configured default filter.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| ApiError::internal_error(format!("Invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_output {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ApiError::internal_error(format!("Failed to init tracing: {e}")))
}
