//! Request validation helpers
//!
//! Small synchronous checks run before any engine call, so malformed input
//! is rejected with a 400 without touching dispatch state.

use crate::error::{ApiError, ApiResult};

/// Require a non-empty, non-whitespace string field.
pub fn require_non_empty(field_name: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::missing_field(field_name));
    }
    Ok(())
}

/// Require a rollout percent in [0, 100].
pub fn require_percent(field_name: &str, value: i64) -> ApiResult<u8> {
    if !(0..=100).contains(&value) {
        return Err(ApiError::invalid_range(field_name, 0, 100));
    }
    Ok(value as u8)
}

/// Require a strictly positive integer field.
pub fn require_positive(field_name: &str, value: i64) -> ApiResult<()> {
    if value <= 0 {
        return Err(ApiError::invalid_range(field_name, 1, i64::MAX));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "hello").is_ok());
        assert!(require_non_empty("name", "").is_err());
        assert!(require_non_empty("name", "   ").is_err());
        assert_eq!(
            require_non_empty("name", "").unwrap_err().code,
            ErrorCode::MissingField
        );
    }

    #[test]
    fn test_require_percent() {
        assert_eq!(require_percent("rollout_percent", 0).unwrap(), 0);
        assert_eq!(require_percent("rollout_percent", 100).unwrap(), 100);
        assert!(require_percent("rollout_percent", 101).is_err());
        assert!(require_percent("rollout_percent", -1).is_err());
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive("version_code", 1).is_ok());
        assert!(require_positive("version_code", 0).is_err());
        assert!(require_positive("version_code", -5).is_err());
    }
}
