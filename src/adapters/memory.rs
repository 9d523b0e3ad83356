//! In-Memory Adapters
//!
//! Test doubles for the domain ports. They keep state in memory and never
//! touch the real mount table or the API server.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::ports::{CapacityDeclaration, CapacityLookup, Mounter, VolumeId};
use crate::error::{Error, Result};

/// A mount recorded by [`InMemoryMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: String,
    pub fstype: String,
    pub options: Vec<String>,
}

/// In-memory mount table.
///
/// Mounting onto an already-mounted target replaces the previous record,
/// the way a remount would. Targets that were ever mounted keep "existing"
/// after unmount, like a directory left behind by the kubelet.
#[derive(Debug, Default)]
pub struct InMemoryMounter {
    mounts: RwLock<HashMap<PathBuf, MountRecord>>,
    created: RwLock<HashSet<PathBuf>>,
    mount_error: RwLock<Option<String>>,
    unmount_error: RwLock<Option<String>>,
    mount_calls: AtomicUsize,
    unmount_calls: AtomicUsize,
}

impl InMemoryMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent mount fail with `reason`.
    pub fn fail_mounts(&self, reason: impl Into<String>) {
        *self.mount_error.write() = Some(reason.into());
    }

    /// Make every subsequent unmount fail with `reason`.
    pub fn fail_unmounts(&self, reason: impl Into<String>) {
        *self.unmount_error.write() = Some(reason.into());
    }

    /// The mount currently at `target`, if any.
    pub fn mount_at(&self, target: &Path) -> Option<MountRecord> {
        self.mounts.read().get(target).cloned()
    }

    pub fn mount_calls(&self) -> usize {
        self.mount_calls.load(Ordering::SeqCst)
    }

    pub fn unmount_calls(&self) -> usize {
        self.unmount_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mounter for InMemoryMounter {
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fstype: &str,
        options: &[String],
    ) -> Result<()> {
        self.mount_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.mount_error.read().clone() {
            return Err(Error::MountFailed {
                path: target.display().to_string(),
                reason,
            });
        }
        self.created.write().insert(target.to_path_buf());
        self.mounts.write().insert(
            target.to_path_buf(),
            MountRecord {
                source: source.to_string(),
                fstype: fstype.to_string(),
                options: options.to_vec(),
            },
        );
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        self.unmount_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.unmount_error.read().clone() {
            return Err(Error::UnmountFailed {
                path: target.display().to_string(),
                reason,
            });
        }
        match self.mounts.write().remove(target) {
            Some(_) => Ok(()),
            None => Err(Error::UnmountFailed {
                path: target.display().to_string(),
                reason: "not mounted".to_string(),
            }),
        }
    }

    async fn is_mounted(&self, target: &Path) -> Result<bool> {
        Ok(self.mounts.read().contains_key(target))
    }

    async fn path_exists(&self, target: &Path) -> Result<bool> {
        if self.created.read().contains(target) {
            return Ok(true);
        }
        Ok(tokio::fs::try_exists(target).await?)
    }
}

/// Capacity lookup backed by a fixed table.
///
/// Volumes missing from the table fail the lookup.
#[derive(Debug, Default)]
pub struct StaticCapacityLookup {
    volumes: RwLock<HashMap<VolumeId, CapacityDeclaration>>,
}

impl StaticCapacityLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, volume_id: impl Into<VolumeId>, declaration: CapacityDeclaration) {
        self.volumes.write().insert(volume_id.into(), declaration);
    }
}

#[async_trait]
impl CapacityLookup for StaticCapacityLookup {
    async fn lookup(&self, volume_id: &VolumeId) -> Result<CapacityDeclaration> {
        self.volumes
            .read()
            .get(volume_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("persistentvolume {}", volume_id)))
    }
}
