//! Declarative device filter for target selection
//!
//! A `DeviceFilter` is the serializable predicate carried inside a
//! `TargetSpec::Filter`. It is evaluated in-process against registry read
//! models; an empty filter matches every device.

use crate::entities::DeviceRecord;
use serde::{Deserialize, Serialize};

/// Declarative predicate over device records.
///
/// All set fields must match (conjunction). Unset fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceFilter {
    /// Only devices currently reachable through the push channel
    #[serde(default)]
    pub online_only: bool,

    /// Restrict version comparisons to this package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Only devices whose installed version of `package` is below this.
    /// Ignored unless `package` is set; devices with no installed record
    /// for the package count as behind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below_version_code: Option<i64>,

    /// Only devices whose alias starts with this prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_prefix: Option<String>,
}

impl DeviceFilter {
    /// Filter for reachable devices only.
    pub fn online() -> Self {
        Self {
            online_only: true,
            ..Self::default()
        }
    }

    /// Filter for devices still behind `version_code` of `package`.
    pub fn behind(package: impl Into<String>, version_code: i64) -> Self {
        Self {
            package: Some(package.into()),
            below_version_code: Some(version_code),
            ..Self::default()
        }
    }

    /// Evaluate the predicate against one registry record.
    pub fn matches(&self, device: &DeviceRecord) -> bool {
        if self.online_only && !device.online {
            return false;
        }

        if let Some(prefix) = &self.alias_prefix {
            if !device.alias.starts_with(prefix.as_str()) {
                return false;
            }
        }

        if let Some(package) = &self.package {
            if let Some(below) = self.below_version_code {
                let installed = device
                    .installed_versions
                    .get(package.as_str())
                    .copied()
                    .unwrap_or(0);
                if installed >= below {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DeviceId;
    use std::collections::HashMap;

    fn device(id: &str, alias: &str, online: bool, versions: &[(&str, i64)]) -> DeviceRecord {
        DeviceRecord {
            device_id: DeviceId::new(id),
            alias: alias.to_string(),
            online,
            last_seen: None,
            installed_versions: versions
                .iter()
                .map(|(p, v)| (p.to_string(), *v))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(&device("d1", "kiosk-1", false, &[])));
        assert!(filter.matches(&device("d2", "van-2", true, &[("app", 7)])));
    }

    #[test]
    fn test_online_only() {
        let filter = DeviceFilter::online();
        assert!(filter.matches(&device("d1", "a", true, &[])));
        assert!(!filter.matches(&device("d2", "b", false, &[])));
    }

    #[test]
    fn test_behind_version() {
        let filter = DeviceFilter::behind("com.example.app", 10);
        // Installed 7 < 10: behind, matches.
        assert!(filter.matches(&device("d1", "a", true, &[("com.example.app", 7)])));
        // Installed 10: up to date, excluded.
        assert!(!filter.matches(&device("d2", "b", true, &[("com.example.app", 10)])));
        // No record for the package counts as behind.
        assert!(filter.matches(&device("d3", "c", true, &[])));
    }

    #[test]
    fn test_below_version_ignored_without_package() {
        let filter = DeviceFilter {
            below_version_code: Some(5),
            ..DeviceFilter::default()
        };
        assert!(filter.matches(&device("d1", "a", true, &[("app", 99)])));
    }

    #[test]
    fn test_alias_prefix() {
        let filter = DeviceFilter {
            alias_prefix: Some("kiosk-".to_string()),
            ..DeviceFilter::default()
        };
        assert!(filter.matches(&device("d1", "kiosk-3", true, &[])));
        assert!(!filter.matches(&device("d2", "van-3", true, &[])));
    }

    #[test]
    fn test_conjunction() {
        let filter = DeviceFilter {
            online_only: true,
            alias_prefix: Some("kiosk-".to_string()),
            ..DeviceFilter::default()
        };
        assert!(filter.matches(&device("d1", "kiosk-3", true, &[])));
        assert!(!filter.matches(&device("d2", "kiosk-4", false, &[])));
    }
}
