//! Volume Lifecycle Manager
//!
//! Node-side publish/unpublish of memory-backed volumes. A volume moves
//! `Unpublished -> Published -> Unpublished`; staging is accepted but does
//! nothing.
//!
//! The orchestrator never issues two lifecycle calls for the same volume
//! at once, so no locking happens here. Nothing is retried: a failed
//! lookup or mount is returned immediately.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::csi::types::NodeServiceCapability;
use crate::domain::ports::{CapacityLookup, Mounter, VolumeId};
use crate::error::{Error, Result};
use crate::logs::{Component, LogStatus};
use crate::metrics;
use crate::volume::capacity::{build_mount_options, MountSizeSpec};

/// Filesystem type and mount source for the backing store.
pub const TMPFS: &str = "tmpfs";

/// What an unpublish call found at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpublishOutcome {
    /// The path does not exist; already cleaned up.
    NotFound,
    /// The path exists but nothing is mounted there.
    NotMounted,
    /// A mount was removed.
    Unmounted,
}

/// Extract the volume name from a kubelet target path.
///
/// `/var/lib/kubelet/pods/<uid>/volumes/kubernetes.io~csi/<pv>/mount`
/// yields `<pv>`; paths without a `mount`/`globalmount` leaf yield their
/// last segment.
pub fn volume_name_from_target_path(target_path: &str) -> Option<&str> {
    let trimmed = target_path.trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix("/globalmount")
        .or_else(|| trimmed.strip_suffix("/mount"))
        .unwrap_or(trimmed);
    trimmed
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Orchestrates publish and unpublish for memory-backed volumes.
#[derive(Clone)]
pub struct VolumeLifecycleManager {
    capacity: Arc<dyn CapacityLookup>,
    mounter: Arc<dyn Mounter>,
}

impl std::fmt::Debug for VolumeLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeLifecycleManager").finish_non_exhaustive()
    }
}

impl VolumeLifecycleManager {
    pub fn new(capacity: Arc<dyn CapacityLookup>, mounter: Arc<dyn Mounter>) -> Self {
        Self { capacity, mounter }
    }

    /// Mount a size-limited tmpfs at `target_path`.
    ///
    /// Whether publishing onto an already-mounted path errors or remounts is
    /// up to the [`Mounter`]; the manager does not check first.
    #[instrument(skip(self), fields(volume_id = %volume_id))]
    pub async fn publish(&self, volume_id: &VolumeId, target_path: &str) -> Result<MountSizeSpec> {
        let result = self.try_publish(volume_id, target_path).await;
        metrics::record_volume_operation("publish", result.is_ok());
        result
    }

    async fn try_publish(&self, volume_id: &VolumeId, target_path: &str) -> Result<MountSizeSpec> {
        if target_path.is_empty() {
            return Err(Error::InvalidArgument("targetPath is empty".to_string()));
        }
        let volume_name = volume_name_from_target_path(target_path).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "cannot parse volume name from targetPath: {}",
                target_path
            ))
        })?;

        let declaration = self.capacity.lookup(volume_id).await.map_err(|e| {
            error!(
                component = %Component::Mem,
                status = %LogStatus::GetPvFailed,
                reason = LogStatus::GetPvFailed.reason(),
                detail = LogStatus::GetPvFailed.message(),
                recommend = LogStatus::GetPvFailed.recommend(),
                error = %e,
                "Failed to look up volume capacity"
            );
            Error::UpstreamLookupFailed {
                volume_id: volume_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        if declaration.required_bytes == 0 {
            warn!(
                component = %Component::Mem,
                status = %LogStatus::InvalidCapacity,
                reason = LogStatus::InvalidCapacity.reason(),
                detail = LogStatus::InvalidCapacity.message(),
                "Volume declares zero capacity"
            );
            return Err(Error::CapacityMissing {
                volume_id: volume_id.to_string(),
            });
        }

        let size = MountSizeSpec::from_bytes(declaration.required_bytes).inspect_err(|e| {
            warn!(
                component = %Component::Mem,
                status = %LogStatus::InvalidCapacity,
                reason = LogStatus::InvalidCapacity.reason(),
                detail = LogStatus::InvalidCapacity.message(),
                recommend = LogStatus::InvalidCapacity.recommend(),
                error = %e,
                "Volume capacity cannot be expressed as a mount size"
            );
        })?;

        let options = build_mount_options(&declaration.mount_options, size);
        debug!(volume_name, ?options, "Mounting memory volume");

        self.mounter
            .mount(TMPFS, Path::new(target_path), TMPFS, &options)
            .await
            .map_err(|e| {
                error!(
                    component = %Component::Mem,
                    status = %LogStatus::MountFailed,
                    reason = LogStatus::MountFailed.reason(),
                    detail = LogStatus::MountFailed.message(),
                    recommend = LogStatus::MountFailed.recommend(),
                    target_path,
                    error = %e,
                    "Failed to mount memory volume"
                );
                match e {
                    err @ Error::MountFailed { .. } => err,
                    other => Error::MountFailed {
                        path: target_path.to_string(),
                        reason: other.to_string(),
                    },
                }
            })?;

        info!(
            component = %Component::Mem,
            target_path,
            size_limit = %size,
            "Mounted memory volume"
        );
        Ok(size)
    }

    /// Remove the mount at `target_path`, if any.
    ///
    /// Succeeds when the path is already gone or not mounted.
    #[instrument(skip(self))]
    pub async fn unpublish(&self, target_path: &str) -> Result<UnpublishOutcome> {
        let result = self.try_unpublish(target_path).await;
        metrics::record_volume_operation("unpublish", result.is_ok());
        result
    }

    async fn try_unpublish(&self, target_path: &str) -> Result<UnpublishOutcome> {
        if target_path.is_empty() {
            return Err(Error::InvalidArgument("targetPath is empty".to_string()));
        }
        let target = Path::new(target_path);

        if !self.mounter.path_exists(target).await? {
            debug!(target_path, "Target path not found, nothing to unpublish");
            return Ok(UnpublishOutcome::NotFound);
        }

        if !self.mounter.is_mounted(target).await? {
            debug!(target_path, "Target path not mounted, nothing to unpublish");
            return Ok(UnpublishOutcome::NotMounted);
        }

        self.mounter.unmount(target).await.map_err(|e| {
            error!(
                component = %Component::Mem,
                status = %LogStatus::UnmountFailed,
                reason = LogStatus::UnmountFailed.reason(),
                detail = LogStatus::UnmountFailed.message(),
                recommend = LogStatus::UnmountFailed.recommend(),
                target_path,
                error = %e,
                "Failed to unmount memory volume"
            );
            match e {
                err @ Error::UnmountFailed { .. } => err,
                other => Error::UnmountFailed {
                    path: target_path.to_string(),
                    reason: other.to_string(),
                },
            }
        })?;

        info!(component = %Component::Mem, target_path, "Unmounted memory volume");
        Ok(UnpublishOutcome::Unmounted)
    }

    /// Node capabilities advertised to the orchestrator.
    pub fn capabilities(&self) -> Vec<NodeServiceCapability> {
        vec![
            NodeServiceCapability::StageUnstageVolume,
            NodeServiceCapability::ExpandVolume,
        ]
    }

    /// Accept an expansion request without touching the mount.
    ///
    /// tmpfs keeps the size cap set at publish time; the new size applies
    /// the next time the volume is published.
    #[instrument(skip(self))]
    pub async fn expand(&self, volume_id: &VolumeId, volume_path: &str) -> Result<()> {
        info!(
            component = %Component::Mem,
            %volume_id,
            volume_path,
            "Expansion accepted, size cap unchanged until republish"
        );
        metrics::record_volume_operation("expand", true);
        Ok(())
    }
}
