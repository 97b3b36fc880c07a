//! API-key authentication
//!
//! Authorization decisions belong to an external identity layer; this module
//! only gates the two caller classes DROVER distinguishes: admin callers
//! (build and execution operations) and device agents (manifest checks and
//! status callbacks). Keys arrive in the `X-Api-Key` header and are checked
//! against static sets loaded from the environment.
//!
//! When no keys are configured at all the API runs open (development mode)
//! and every request is treated as admin.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Which class of caller a request authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Admin,
    Device,
}

/// Authenticated request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub role: CallerRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }
}

/// Static key sets for the two caller classes.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub admin_keys: HashSet<String>,
    pub device_keys: HashSet<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("AuthConfig")
            .field("admin_keys", &format!("[{} keys]", self.admin_keys.len()))
            .field("device_keys", &format!("[{} keys]", self.device_keys.len()))
            .finish()
    }
}

impl AuthConfig {
    /// Create an AuthConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DROVER_ADMIN_KEYS`: Comma-separated admin API keys
    /// - `DROVER_DEVICE_KEYS`: Comma-separated device-agent API keys
    pub fn from_env() -> Self {
        Self {
            admin_keys: parse_keys("DROVER_ADMIN_KEYS"),
            device_keys: parse_keys("DROVER_DEVICE_KEYS"),
        }
    }

    /// Open configuration for development and tests: no keys, everyone is
    /// admin.
    pub fn open() -> Self {
        Self::default()
    }

    /// True when no keys are configured and auth is disabled.
    pub fn is_open(&self) -> bool {
        self.admin_keys.is_empty() && self.device_keys.is_empty()
    }

    /// Authenticate one presented key (or none).
    pub fn authenticate(&self, api_key: Option<&str>) -> Result<AuthContext, ApiError> {
        if self.is_open() {
            return Ok(AuthContext {
                role: CallerRole::Admin,
            });
        }
        let Some(key) = api_key else {
            return Err(ApiError::unauthorized("Missing X-Api-Key header"));
        };
        if self.admin_keys.contains(key) {
            return Ok(AuthContext {
                role: CallerRole::Admin,
            });
        }
        if self.device_keys.contains(key) {
            return Ok(AuthContext {
                role: CallerRole::Device,
            });
        }
        Err(ApiError::unauthorized("Unknown API key"))
    }
}

fn parse_keys(var: &str) -> HashSet<String> {
    std::env::var(var)
        .ok()
        .map(|list| {
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// EXTRACTORS
// ============================================================================

/// Extractor authenticating any valid caller (admin or device).
pub struct AuthExtractor(pub AuthContext);

/// Extractor requiring an admin caller.
pub struct RequireAdmin(pub AuthContext);

fn key_from_parts(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    Arc<AuthConfig>: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config: Arc<AuthConfig> = axum::extract::FromRef::from_ref(state);
        let key = key_from_parts(parts);
        config.authenticate(key.as_deref()).map(AuthExtractor)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AuthConfig>: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config: Arc<AuthConfig> = axum::extract::FromRef::from_ref(state);
        let key = key_from_parts(parts);
        let context = config.authenticate(key.as_deref())?;
        if !context.is_admin() {
            return Err(ApiError::forbidden(
                "Admin API key required for this operation",
            ));
        }
        Ok(RequireAdmin(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            admin_keys: HashSet::from(["admin-key".to_string()]),
            device_keys: HashSet::from(["device-key".to_string()]),
        }
    }

    #[test]
    fn test_open_config_is_admin() {
        let context = AuthConfig::open().authenticate(None).unwrap();
        assert!(context.is_admin());
    }

    #[test]
    fn test_admin_key() {
        let context = config().authenticate(Some("admin-key")).unwrap();
        assert_eq!(context.role, CallerRole::Admin);
    }

    #[test]
    fn test_device_key_is_not_admin() {
        let context = config().authenticate(Some("device-key")).unwrap();
        assert_eq!(context.role, CallerRole::Device);
        assert!(!context.is_admin());
    }

    #[test]
    fn test_missing_and_unknown_keys_rejected() {
        assert!(config().authenticate(None).is_err());
        assert!(config().authenticate(Some("wrong")).is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("admin-key"));
        assert!(debug.contains("[1 keys]"));
    }
}
