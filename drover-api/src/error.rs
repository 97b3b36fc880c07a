//! Error types for the DROVER API
//!
//! Structured error responses: an `ErrorCode` enum categorizing the failure,
//! mapped to an HTTP status code, serialized as JSON by the axum
//! `IntoResponse` impl. Engine errors convert losslessly via `From`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drover_core::{
    DispatchError, DroverError, RolloutError, StorageError, TargetError, TransportError,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication (401, 403)
    /// Request lacks a valid API key
    Unauthorized,
    /// Key is valid but not allowed to perform this operation
    Forbidden,

    // Validation (400)
    /// Request validation failed
    ValidationFailed,
    /// Request contains invalid input data
    InvalidInput,
    /// Required field is missing from request
    MissingField,
    /// Field value is out of valid range
    InvalidRange,

    // Not found (404)
    /// Requested build does not exist
    BuildNotFound,
    /// Requested execution does not exist
    ExecutionNotFound,
    /// Requested device does not exist
    DeviceNotFound,
    /// No rollback target exists for the package
    NoPriorBuild,

    // Conflict (409)
    /// Another promotion is in flight for the same package
    PromotionConflict,
    /// Operation conflicts with current state
    StateConflict,

    // Server (5xx)
    /// Internal server error
    InternalError,
    /// Device registry or status source unavailable
    UpstreamUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::BuildNotFound
            | ErrorCode::ExecutionNotFound
            | ErrorCode::DeviceNotFound
            | ErrorCode::NoPriorBuild => StatusCode::NOT_FOUND,

            ErrorCode::PromotionConflict | ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::BuildNotFound => "Build not found",
            ErrorCode::ExecutionNotFound => "Execution not found",
            ErrorCode::DeviceNotFound => "Device not found",
            ErrorCode::NoPriorBuild => "No prior build to roll back to",
            ErrorCode::PromotionConflict => "Another promotion is in flight for this package",
            ErrorCode::StateConflict => "Operation conflicts with current state",
            ErrorCode::UpstreamUnavailable => "Upstream collaborator unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field is missing: {field}"),
        )
    }

    pub fn invalid_range(field: &str, min: i64, max: i64) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("{field} must be between {min} and {max}"),
        )
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// ENGINE ERROR CONVERSION
// ============================================================================

impl From<DroverError> for ApiError {
    fn from(error: DroverError) -> Self {
        match &error {
            DroverError::Validation(validation) => match validation {
                ValidationError::PercentOutOfRange { .. } => {
                    ApiError::new(ErrorCode::InvalidRange, error.to_string())
                }
                ValidationError::MissingField { field } => ApiError::missing_field(field),
                _ => ApiError::new(ErrorCode::ValidationFailed, error.to_string()),
            },
            DroverError::Rollout(rollout) => match rollout {
                RolloutError::BuildNotFound { .. } => {
                    ApiError::new(ErrorCode::BuildNotFound, error.to_string())
                }
                RolloutError::PromotionConflict { .. } => {
                    ApiError::new(ErrorCode::PromotionConflict, error.to_string())
                }
                RolloutError::NoPriorBuild { .. } => {
                    ApiError::new(ErrorCode::NoPriorBuild, error.to_string())
                }
                RolloutError::NotCurrent { .. }
                | RolloutError::NotPromotable { .. }
                | RolloutError::VersionNotMonotonic { .. } => {
                    ApiError::new(ErrorCode::StateConflict, error.to_string())
                }
            },
            DroverError::Target(TargetError::RegistryUnavailable { .. }) => {
                ApiError::new(ErrorCode::UpstreamUnavailable, error.to_string())
            }
            DroverError::Dispatch(dispatch) => match dispatch {
                DispatchError::ExecutionNotFound { .. } => {
                    ApiError::new(ErrorCode::ExecutionNotFound, error.to_string())
                }
                DispatchError::NotCancellable { .. } => {
                    ApiError::new(ErrorCode::StateConflict, error.to_string())
                }
            },
            DroverError::Storage(storage) => match storage {
                StorageError::BuildNotFound { .. } => {
                    ApiError::new(ErrorCode::BuildNotFound, error.to_string())
                }
                StorageError::ExecutionNotFound { .. } => {
                    ApiError::new(ErrorCode::ExecutionNotFound, error.to_string())
                }
                StorageError::DeviceNotInExecution { .. } => {
                    ApiError::new(ErrorCode::DeviceNotFound, error.to_string())
                }
                StorageError::LockPoisoned => ApiError::internal_error(error.to_string()),
            },
            // Transport errors are recorded per-device and never surface as
            // an API failure of the run; reaching here means a programming
            // error upstream.
            DroverError::Transport(TransportError::NoChannel { .. })
            | DroverError::Transport(TransportError::Rejected { .. })
            | DroverError::Transport(TransportError::Timeout { .. }) => {
                ApiError::internal_error(error.to_string())
            }
        }
    }
}
