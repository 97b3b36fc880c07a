//! Device registry boundary
//!
//! The registry is an external collaborator: DROVER reads device identity,
//! reachability, and installed versions, and never writes. The in-memory
//! implementation serves tests and single-node deployments seeded from a
//! fixture file.

use async_trait::async_trait;
use drover_core::{DeviceId, DeviceRecord, DroverResult, StorageError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-only view of the fleet registry.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Every registered device, sorted by device id for deterministic
    /// target resolution.
    async fn list(&self) -> DroverResult<Vec<DeviceRecord>>;

    /// Look up one device by id.
    async fn get(&self, device_id: &DeviceId) -> DroverResult<Option<DeviceRecord>>;

    /// Look up one device by its human-facing alias.
    async fn find_by_alias(&self, alias: &str) -> DroverResult<Option<DeviceRecord>>;
}

/// In-memory registry backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryDeviceRegistry {
    devices: RwLock<HashMap<DeviceId, DeviceRecord>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `devices`.
    pub fn seeded(devices: Vec<DeviceRecord>) -> Self {
        let registry = Self::new();
        registry.upsert_all(devices);
        registry
    }

    /// Replace or insert device records (registry sync path).
    pub fn upsert_all(&self, devices: Vec<DeviceRecord>) {
        let mut map = self.devices.write().unwrap_or_else(|e| e.into_inner());
        for device in devices {
            map.insert(device.device_id.clone(), device);
        }
    }

    pub fn len(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn list(&self) -> DroverResult<Vec<DeviceRecord>> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut devices: Vec<DeviceRecord> = map.values().cloned().collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    async fn get(&self, device_id: &DeviceId) -> DroverResult<Option<DeviceRecord>> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(map.get(device_id).cloned())
    }

    async fn find_by_alias(&self, alias: &str) -> DroverResult<Option<DeviceRecord>> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(map.values().find(|d| d.alias == alias).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, alias: &str) -> DeviceRecord {
        DeviceRecord {
            device_id: DeviceId::new(id),
            alias: alias.to_string(),
            online: true,
            last_seen: None,
            installed_versions: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_device_id() {
        let registry =
            InMemoryDeviceRegistry::seeded(vec![device("z9", "last"), device("a1", "first")]);
        let devices = registry.list().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id.as_str(), "a1");
        assert_eq!(devices[1].device_id.as_str(), "z9");
    }

    #[tokio::test]
    async fn test_get_and_alias_lookup() {
        let registry = InMemoryDeviceRegistry::seeded(vec![device("d1", "kiosk-1")]);
        assert!(registry.get(&DeviceId::new("d1")).await.unwrap().is_some());
        assert!(registry.get(&DeviceId::new("d2")).await.unwrap().is_none());
        assert_eq!(
            registry
                .find_by_alias("kiosk-1")
                .await
                .unwrap()
                .unwrap()
                .device_id
                .as_str(),
            "d1"
        );
        assert!(registry.find_by_alias("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let registry = InMemoryDeviceRegistry::seeded(vec![device("d1", "old")]);
        registry.upsert_all(vec![device("d1", "new")]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry
                .get(&DeviceId::new("d1"))
                .await
                .unwrap()
                .unwrap()
                .alias,
            "new"
        );
    }
}
