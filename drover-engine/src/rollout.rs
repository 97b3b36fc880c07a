//! Rollout controller
//!
//! Owns the build promotion state machine: promote, adjust rollout percent,
//! roll back, and the manifest eligibility check. All lifecycle writes for
//! one package are serialized through a per-package guard so the "at most
//! one current build per package" invariant survives concurrent admin calls;
//! different packages promote independently.

use dashmap::DashMap;
use drover_core::{
    cohort, eligible, Build, BuildId, BuildState, DeviceId, DroverResult, Manifest,
    PromoteOutcome, RollbackOutcome, RolloutError, ValidationError,
};
use drover_storage::BuildStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-package serialized rollout state machine over a [`BuildStore`].
pub struct RolloutController {
    builds: Arc<dyn BuildStore>,
    /// One guard per package; promotion/rollback hold it, concurrent
    /// attempts get a retryable conflict instead of queueing.
    guards: DashMap<String, Arc<Mutex<()>>>,
    /// Base URL the artifact store serves build downloads from
    download_base: String,
}

impl RolloutController {
    pub fn new(builds: Arc<dyn BuildStore>, download_base: impl Into<String>) -> Self {
        Self {
            builds,
            guards: DashMap::new(),
            download_base: download_base.into(),
        }
    }

    fn guard_for(&self, package_name: &str) -> Arc<Mutex<()>> {
        self.guards
            .entry(package_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Promote a build to `Current` for its package.
    ///
    /// The build must be `Draft` or `Superseded`. The previously current
    /// build (if any) becomes `Superseded` in the same guarded section.
    /// Returns the prior build id for audit. A promotion already in flight
    /// for the same package yields [`RolloutError::PromotionConflict`].
    pub async fn promote(
        &self,
        build_id: BuildId,
        rollout_percent: u8,
        wifi_only: bool,
        must_install: bool,
    ) -> DroverResult<PromoteOutcome> {
        validate_percent(rollout_percent)?;

        let build = self.require_build(build_id).await?;
        let guard = self.guard_for(&build.package_name);
        let Ok(_held) = guard.try_lock() else {
            return Err(RolloutError::PromotionConflict {
                package_name: build.package_name,
            }
            .into());
        };

        // Re-read under the guard; the state may have moved since the
        // pre-check.
        let build = self.require_build(build_id).await?;
        if !matches!(build.state, BuildState::Draft | BuildState::Superseded) {
            return Err(RolloutError::NotPromotable {
                build_id,
                state: build.state,
            }
            .into());
        }

        let prior = self.builds.current_for_package(&build.package_name).await?;
        if let Some(prior) = &prior {
            self.builds
                .set_state(prior.build_id, BuildState::Superseded)
                .await?;
        }
        self.builds
            .set_rollout_fields(build_id, rollout_percent, wifi_only, must_install)
            .await?;
        self.builds.set_state(build_id, BuildState::Current).await?;

        tracing::info!(
            build_id = %build_id,
            package = %build.package_name,
            version_code = build.version_code,
            rollout_percent,
            prior_build = ?prior.as_ref().map(|b| b.build_id),
            "Build promoted"
        );

        Ok(PromoteOutcome {
            build_id,
            prior_build_id: prior.map(|b| b.build_id),
            rollout_percent,
        })
    }

    /// Adjust the rollout percent of the current build in place.
    pub async fn adjust_rollout(&self, build_id: BuildId, new_percent: u8) -> DroverResult<(u8, u8)> {
        validate_percent(new_percent)?;

        let build = self.require_build(build_id).await?;
        if build.state != BuildState::Current {
            return Err(RolloutError::NotCurrent {
                build_id,
                state: build.state,
            }
            .into());
        }

        let old_percent = build.rollout_percent;
        self.builds.update_rollout(build_id, new_percent).await?;

        tracing::info!(
            build_id = %build_id,
            package = %build.package_name,
            old_percent,
            new_percent,
            "Rollout percent adjusted"
        );
        Ok((old_percent, new_percent))
    }

    /// Roll the package back to its most recently superseded build.
    ///
    /// The current build becomes `RolledBack` (a dead end: it can never be
    /// promoted again), the superseded build returns to `Current` with its
    /// previous rollout fields. Rollback always proceeds regardless of
    /// version direction; the outcome's `downgrade` flag tells callers to
    /// surface a warning, and `force_downgrade` is passed through to
    /// install-time behavior on the device.
    pub async fn rollback(
        &self,
        package_name: &str,
        force_downgrade: bool,
    ) -> DroverResult<RollbackOutcome> {
        let guard = self.guard_for(package_name);
        let Ok(_held) = guard.try_lock() else {
            return Err(RolloutError::PromotionConflict {
                package_name: package_name.to_string(),
            }
            .into());
        };

        let current = self
            .builds
            .current_for_package(package_name)
            .await?
            .ok_or_else(|| RolloutError::NoPriorBuild {
                package_name: package_name.to_string(),
            })?;
        let target = self
            .builds
            .latest_superseded_for_package(package_name)
            .await?
            .ok_or_else(|| RolloutError::NoPriorBuild {
                package_name: package_name.to_string(),
            })?;

        self.builds
            .set_state(current.build_id, BuildState::RolledBack)
            .await?;
        self.builds
            .set_state(target.build_id, BuildState::Current)
            .await?;

        let downgrade = target.version_code < current.version_code;
        tracing::warn!(
            package = %package_name,
            rolled_back = %current.build_id,
            restored = %target.build_id,
            restored_version = target.version_code,
            downgrade,
            force_downgrade,
            "Package rolled back"
        );

        Ok(RollbackOutcome {
            rolled_back_build_id: current.build_id,
            restored_build_id: target.build_id,
            restored_version_code: target.version_code,
            downgrade,
        })
    }

    /// Manifest eligibility check for one device.
    ///
    /// Returns `None` ("no update") when there is no current build, the
    /// device is already at or past it, or the device's cohort falls outside
    /// the rollout percent. Side-effect-free: only an observability event
    /// records the decision and its reason.
    pub async fn check_manifest(
        &self,
        device_id: &DeviceId,
        package_name: &str,
        current_version_code: i64,
    ) -> DroverResult<Option<Manifest>> {
        let Some(build) = self.builds.current_for_package(package_name).await? else {
            tracing::debug!(
                device_id = %device_id,
                package = %package_name,
                reason = "no_current_build",
                "Manifest check: no update"
            );
            return Ok(None);
        };

        if current_version_code >= build.version_code {
            tracing::debug!(
                device_id = %device_id,
                package = %package_name,
                installed = current_version_code,
                available = build.version_code,
                reason = "up_to_date",
                "Manifest check: no update"
            );
            return Ok(None);
        }

        if !eligible(device_id, build.rollout_percent) {
            tracing::debug!(
                device_id = %device_id,
                package = %package_name,
                cohort = cohort(device_id),
                rollout_percent = build.rollout_percent,
                reason = "not_eligible",
                "Manifest check: no update"
            );
            return Ok(None);
        }

        tracing::debug!(
            device_id = %device_id,
            package = %package_name,
            build_id = %build.build_id,
            version_code = build.version_code,
            "Manifest check: update offered"
        );
        let url = format!(
            "{}/{}/{}.pkg",
            self.download_base.trim_end_matches('/'),
            build.package_name,
            build.version_code
        );
        Ok(Some(Manifest::for_build(&build, url)))
    }

    async fn require_build(&self, build_id: BuildId) -> DroverResult<Build> {
        self.builds
            .get(build_id)
            .await?
            .ok_or_else(|| RolloutError::BuildNotFound { build_id }.into())
    }
}

fn validate_percent(percent: u8) -> DroverResult<()> {
    if percent > 100 {
        return Err(ValidationError::PercentOutOfRange {
            value: percent as i64,
        }
        .into());
    }
    Ok(())
}
