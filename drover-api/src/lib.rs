//! DROVER API - REST surface for the fleet dispatch engine
//!
//! Wires the engine (rollout controller, execution supervisor) behind an
//! axum router: manifest checks for devices, build/rollout admin, execution
//! admin, device status callbacks, health. See `main.rs` for the server
//! binary.

pub mod auth;
pub mod config;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod validation;

pub use auth::{AuthConfig, AuthContext};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
pub use transport::{CallbackOnlyStatusSource, HttpPushTransport, LoopbackTransport};
