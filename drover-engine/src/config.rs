//! Engine configuration

use drover_core::RetryConfig;
use std::time::Duration;

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PREVIEW_SAMPLE: usize = 10;

/// Configuration for the dispatch batcher and execution supervisor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Devices per dispatch batch. Batching bounds blast radius and cost
    /// per transport call burst; it does not serialize batches.
    pub batch_size: usize,

    /// Fixed interval between poll cycles (default: 2 seconds)
    pub poll_interval: Duration,

    /// Global completion window for one execution; devices still
    /// non-terminal when it elapses are marked `timeout`
    /// (default: 5 minutes)
    pub global_timeout: Duration,

    /// Per-call timeout on one transport send
    pub send_timeout: Duration,

    /// Retry policy for transport sends
    pub retry: RetryConfig,

    /// How many `(device_id, alias)` pairs a preview response samples
    pub preview_sample: usize,

    /// Commands the restricted-shell mode may run (first token is matched)
    pub allowed_commands: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            global_timeout: Duration::from_secs(DEFAULT_GLOBAL_TIMEOUT_SECS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            preview_sample: DEFAULT_PREVIEW_SAMPLE,
            allowed_commands: vec![
                "reboot".to_string(),
                "sync-config".to_string(),
                "clear-cache".to_string(),
                "report-logs".to_string(),
            ],
        }
    }
}

impl EngineConfig {
    /// Create an EngineConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DROVER_BATCH_SIZE`: Devices per dispatch batch (default: 50)
    /// - `DROVER_POLL_INTERVAL_SECS`: Poll cycle interval (default: 2)
    /// - `DROVER_GLOBAL_TIMEOUT_SECS`: Completion window (default: 300)
    /// - `DROVER_SEND_TIMEOUT_SECS`: Per-send timeout (default: 5)
    /// - `DROVER_SEND_ATTEMPTS`: Transport attempts per device (default: 3)
    /// - `DROVER_ALLOWED_COMMANDS`: Comma-separated restricted-shell allow-list
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let batch_size = env_parse("DROVER_BATCH_SIZE", defaults.batch_size).max(1);
        let poll_interval = Duration::from_secs(env_parse(
            "DROVER_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        ));
        let global_timeout = Duration::from_secs(env_parse(
            "DROVER_GLOBAL_TIMEOUT_SECS",
            DEFAULT_GLOBAL_TIMEOUT_SECS,
        ));
        let send_timeout = Duration::from_secs(env_parse(
            "DROVER_SEND_TIMEOUT_SECS",
            DEFAULT_SEND_TIMEOUT_SECS,
        ));
        let retry = RetryConfig {
            max_attempts: env_parse("DROVER_SEND_ATTEMPTS", defaults.retry.max_attempts),
            ..defaults.retry
        };
        let allowed_commands = std::env::var("DROVER_ALLOWED_COMMANDS")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_commands);

        Self {
            batch_size,
            poll_interval,
            global_timeout,
            send_timeout,
            retry,
            preview_sample: DEFAULT_PREVIEW_SAMPLE,
            allowed_commands,
        }
    }

    /// Configuration with short intervals for development and tests.
    pub fn development() -> Self {
        Self {
            batch_size: 4,
            poll_interval: Duration::from_millis(20),
            global_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_millis(250),
            retry: RetryConfig {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
                backoff_multiplier: 2.0,
            },
            preview_sample: 5,
            allowed_commands: Self::default().allowed_commands,
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
