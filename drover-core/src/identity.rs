//! Identity types for DROVER entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Execution identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type ExecutionId = Uuid;

/// Build identifier. Also UUIDv7 so build rows sort by upload time.
pub type BuildId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 artifact checksum.
pub type Checksum = [u8; 32];

/// Generate a new UUIDv7 ExecutionId (timestamp-sortable).
pub fn new_execution_id() -> ExecutionId {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 BuildId (timestamp-sortable).
pub fn new_build_id() -> BuildId {
    Uuid::now_v7()
}

/// Compute the SHA-256 checksum of artifact content.
pub fn compute_checksum(content: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex form of an artifact checksum, as carried on build rows and manifests.
pub fn checksum_hex(checksum: &Checksum) -> String {
    hex::encode(checksum)
}

/// Stable device identifier, assigned by the external device registry.
///
/// Device identity is opaque to this system: the registry owns the full
/// device record, DROVER only keys on the identifier. The newtype keeps
/// device ids from being confused with aliases or package names in
/// function signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_ids_are_sortable_by_creation() {
        let a = new_execution_id();
        let b = new_execution_id();
        // UUIDv7 embeds a timestamp, so later ids never sort before earlier ones.
        assert!(a <= b);
    }

    #[test]
    fn test_compute_checksum_is_deterministic() {
        let a = compute_checksum(b"artifact bytes");
        let b = compute_checksum(b"artifact bytes");
        assert_eq!(a, b);
        assert_ne!(a, compute_checksum(b"other bytes"));
    }

    #[test]
    fn test_checksum_hex_is_64_chars() {
        let hex = checksum_hex(&compute_checksum(b"x"));
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_device_id_roundtrip() {
        let id = DeviceId::new("d-0042");
        assert_eq!(id.as_str(), "d-0042");
        assert_eq!(id.to_string(), "d-0042");
        assert_eq!("d-0042".parse::<DeviceId>().unwrap(), id);
    }

    #[test]
    fn test_device_id_serde_transparent() {
        let id = DeviceId::new("d-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"d-1\"");
        let back: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
