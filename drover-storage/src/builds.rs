//! Build store
//!
//! Build rows are shared read-only by manifest checks and executions; all
//! lifecycle writes go through the rollout controller, which serializes
//! them per package. The store itself only enforces row-level invariants
//! (per-package version_code monotonicity on insert).

use async_trait::async_trait;
use chrono::Utc;
use drover_core::{
    new_build_id, Build, BuildId, BuildState, DroverResult, RolloutError, StorageError,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Input for registering a freshly uploaded build. Rows always start in
/// `Draft` with a zero rollout.
#[derive(Debug, Clone)]
pub struct NewBuild {
    pub package_name: String,
    pub version_code: i64,
    pub version_name: String,
    pub checksum: String,
    pub signer_fingerprint: String,
    pub file_size: i64,
}

/// Storage surface for build rows.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Register a new draft build. Fails if `version_code` is not strictly
    /// above every existing build of the same package.
    async fn insert(&self, new_build: NewBuild) -> DroverResult<Build>;

    /// Get a build by id.
    async fn get(&self, build_id: BuildId) -> DroverResult<Option<Build>>;

    /// The one `Current` build for a package, if any.
    async fn current_for_package(&self, package_name: &str) -> DroverResult<Option<Build>>;

    /// The most recently superseded build for a package - the rollback
    /// target.
    async fn latest_superseded_for_package(
        &self,
        package_name: &str,
    ) -> DroverResult<Option<Build>>;

    /// All builds for a package, newest version first.
    async fn list_for_package(&self, package_name: &str) -> DroverResult<Vec<Build>>;

    /// Transition a build's lifecycle state.
    async fn set_state(&self, build_id: BuildId, state: BuildState) -> DroverResult<Build>;

    /// Update rollout percent in place.
    async fn update_rollout(&self, build_id: BuildId, percent: u8) -> DroverResult<Build>;

    /// Set the rollout fields applied at promotion time.
    async fn set_rollout_fields(
        &self,
        build_id: BuildId,
        percent: u8,
        wifi_only: bool,
        must_install: bool,
    ) -> DroverResult<Build>;
}

/// In-memory build store backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryBuildStore {
    builds: RwLock<HashMap<BuildId, Build>>,
}

impl InMemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&HashMap<BuildId, Build>) -> T,
    ) -> DroverResult<T> {
        let map = self.builds.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&map))
    }

    fn mutate(
        &self,
        build_id: BuildId,
        f: impl FnOnce(&mut Build),
    ) -> DroverResult<Build> {
        let mut map = self
            .builds
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let build = map
            .get_mut(&build_id)
            .ok_or(StorageError::BuildNotFound { build_id })?;
        f(build);
        build.updated_at = Utc::now();
        Ok(build.clone())
    }
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn insert(&self, new_build: NewBuild) -> DroverResult<Build> {
        let mut map = self
            .builds
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let prior = map
            .values()
            .filter(|b| b.package_name == new_build.package_name)
            .map(|b| b.version_code)
            .max();
        if let Some(prior) = prior {
            if new_build.version_code <= prior {
                return Err(RolloutError::VersionNotMonotonic {
                    package_name: new_build.package_name,
                    version_code: new_build.version_code,
                    prior,
                }
                .into());
            }
        }

        let now = Utc::now();
        let build = Build {
            build_id: new_build_id(),
            package_name: new_build.package_name,
            version_code: new_build.version_code,
            version_name: new_build.version_name,
            checksum: new_build.checksum,
            signer_fingerprint: new_build.signer_fingerprint,
            file_size: new_build.file_size,
            rollout_percent: 0,
            wifi_only: false,
            must_install: false,
            state: BuildState::Draft,
            created_at: now,
            updated_at: now,
        };
        map.insert(build.build_id, build.clone());
        Ok(build)
    }

    async fn get(&self, build_id: BuildId) -> DroverResult<Option<Build>> {
        self.with_map(|map| map.get(&build_id).cloned())
    }

    async fn current_for_package(&self, package_name: &str) -> DroverResult<Option<Build>> {
        self.with_map(|map| {
            map.values()
                .find(|b| b.package_name == package_name && b.state == BuildState::Current)
                .cloned()
        })
    }

    async fn latest_superseded_for_package(
        &self,
        package_name: &str,
    ) -> DroverResult<Option<Build>> {
        self.with_map(|map| {
            map.values()
                .filter(|b| b.package_name == package_name && b.state == BuildState::Superseded)
                .max_by_key(|b| (b.updated_at, b.version_code))
                .cloned()
        })
    }

    async fn list_for_package(&self, package_name: &str) -> DroverResult<Vec<Build>> {
        self.with_map(|map| {
            let mut builds: Vec<Build> = map
                .values()
                .filter(|b| b.package_name == package_name)
                .cloned()
                .collect();
            builds.sort_by(|a, b| b.version_code.cmp(&a.version_code));
            builds
        })
    }

    async fn set_state(&self, build_id: BuildId, state: BuildState) -> DroverResult<Build> {
        self.mutate(build_id, |b| b.state = state)
    }

    async fn update_rollout(&self, build_id: BuildId, percent: u8) -> DroverResult<Build> {
        self.mutate(build_id, |b| b.rollout_percent = percent)
    }

    async fn set_rollout_fields(
        &self,
        build_id: BuildId,
        percent: u8,
        wifi_only: bool,
        must_install: bool,
    ) -> DroverResult<Build> {
        self.mutate(build_id, |b| {
            b.rollout_percent = percent;
            b.wifi_only = wifi_only;
            b.must_install = must_install;
        })
    }
}
