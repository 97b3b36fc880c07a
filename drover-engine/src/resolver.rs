//! Target resolver
//!
//! Turns a declarative [`TargetSpec`] into a concrete device set by reading
//! the external registry. Resolution is deterministic (sorted by device id,
//! deduplicated) so previews and tests are reproducible; unresolved entries
//! from explicit lists are reported, never dropped.

use drover_core::{
    DeviceId, DeviceRecord, DroverResult, ResolvedTargets, TargetPreview, TargetSpec,
};
use drover_storage::DeviceRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry read-through for target selection.
pub struct TargetResolver {
    registry: Arc<dyn DeviceRegistry>,
}

impl TargetResolver {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a target spec to its device set.
    pub async fn resolve(&self, spec: &TargetSpec) -> DroverResult<ResolvedTargets> {
        match spec {
            TargetSpec::All { online_only } => {
                let devices = self
                    .registry
                    .list()
                    .await?
                    .into_iter()
                    .filter(|d| !online_only || d.online)
                    .collect();
                Ok(ResolvedTargets {
                    devices,
                    unresolved: Vec::new(),
                })
            }
            TargetSpec::Filter { filter } => {
                let devices = self
                    .registry
                    .list()
                    .await?
                    .into_iter()
                    .filter(|d| filter.matches(d))
                    .collect();
                Ok(ResolvedTargets {
                    devices,
                    unresolved: Vec::new(),
                })
            }
            TargetSpec::Devices { entries } => self.resolve_entries(entries).await,
        }
    }

    /// Resolve explicit entries: each is tried first as a device id, then
    /// as an alias. Duplicates collapse to one row.
    async fn resolve_entries(&self, entries: &[String]) -> DroverResult<ResolvedTargets> {
        let mut matched: BTreeMap<DeviceId, DeviceRecord> = BTreeMap::new();
        let mut unresolved = Vec::new();

        for entry in entries {
            let by_id = self.registry.get(&DeviceId::new(entry.clone())).await?;
            let record = match by_id {
                Some(record) => Some(record),
                None => self.registry.find_by_alias(entry).await?,
            };
            match record {
                Some(record) => {
                    matched.insert(record.device_id.clone(), record);
                }
                None => unresolved.push(entry.clone()),
            }
        }

        Ok(ResolvedTargets {
            devices: matched.into_values().collect(),
            unresolved,
        })
    }

    /// Dry-run preview: count, a bounded sample, and unresolved entries.
    /// Touches only the registry; no execution rows, no dispatch.
    pub async fn preview(&self, spec: &TargetSpec, sample_k: usize) -> DroverResult<TargetPreview> {
        let resolved = self.resolve(spec).await?;
        let sample = resolved
            .devices
            .iter()
            .take(sample_k)
            .map(|d| (d.device_id.to_string(), d.alias.clone()))
            .collect();
        Ok(TargetPreview {
            count: resolved.devices.len(),
            sample,
            unresolved: resolved.unresolved,
        })
    }
}
