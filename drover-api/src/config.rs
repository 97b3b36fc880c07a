//! API configuration
//!
//! Environment-loaded settings for the HTTP surface and the wiring of
//! external collaborators (push gateway, registry seed). Engine timing knobs
//! live in `drover_engine::EngineConfig`.

use std::time::Duration;

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host (default `0.0.0.0`)
    pub bind_host: String,

    /// Bind port (default 3000)
    pub port: u16,

    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,

    /// Base URL the artifact store serves build downloads from
    pub download_base: String,

    /// Push gateway endpoint. When unset, a loopback transport that accepts
    /// every send is used (dev mode).
    pub push_gateway_url: Option<String>,

    /// Timeout for one push gateway call
    pub push_timeout: Duration,

    /// Optional JSON file of device records to seed the in-memory registry
    pub registry_seed_path: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            download_base: "http://localhost:3000/artifacts".to_string(),
            push_gateway_url: None,
            push_timeout: Duration::from_secs(5),
            registry_seed_path: None,
        }
    }
}

impl ApiConfig {
    /// Create an ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DROVER_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` / `DROVER_API_PORT`: Bind port (default: 3000)
    /// - `DROVER_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `DROVER_DOWNLOAD_BASE`: Artifact download base URL
    /// - `DROVER_PUSH_GATEWAY_URL`: Push gateway endpoint (unset = loopback)
    /// - `DROVER_PUSH_TIMEOUT_SECS`: Push call timeout (default: 5)
    /// - `DROVER_REGISTRY_SEED`: Path to a JSON device-records seed file
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_host = std::env::var("DROVER_API_BIND").unwrap_or(defaults.bind_host);
        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("DROVER_API_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        let cors_origins = std::env::var("DROVER_CORS_ORIGINS")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let download_base =
            std::env::var("DROVER_DOWNLOAD_BASE").unwrap_or(defaults.download_base);
        let push_gateway_url = std::env::var("DROVER_PUSH_GATEWAY_URL").ok();
        let push_timeout = Duration::from_secs(
            std::env::var("DROVER_PUSH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );
        let registry_seed_path = std::env::var("DROVER_REGISTRY_SEED").ok();

        Self {
            bind_host,
            port,
            cors_origins,
            download_base,
            push_gateway_url,
            push_timeout,
            registry_seed_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.cors_origins.is_empty());
        assert!(config.push_gateway_url.is_none());
    }
}
