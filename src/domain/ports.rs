//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! This module defines the capabilities the volume lifecycle depends on.
//! Infrastructure adapters implement these traits; the lifecycle manager
//! receives them through its constructor so tests can swap in fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │           CapacityLookup   │   Mounter               │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  KubeCapacityLookup │ SystemMounter │ InMemory*      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Volume identifier (value object).
///
/// Assigned once when the volume is created and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Desired size and mount options declared by the cluster's volume object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityDeclaration {
    /// Declared capacity in bytes
    pub required_bytes: u64,
    /// Mount options in declaration order
    pub mount_options: Vec<String>,
}

impl CapacityDeclaration {
    pub fn new(required_bytes: u64, mount_options: Vec<String>) -> Self {
        Self {
            required_bytes,
            mount_options,
        }
    }
}

// =============================================================================
// Capacity Port
// =============================================================================

/// Port for reading a volume's declared capacity from the cluster.
#[async_trait]
pub trait CapacityLookup: Send + Sync {
    /// Fetch the capacity declaration for a volume.
    async fn lookup(&self, volume_id: &VolumeId) -> Result<CapacityDeclaration>;
}

// =============================================================================
// Mount Port
// =============================================================================

/// Port for filesystem mount primitives.
///
/// Implementations decide what a second mount on an already-mounted target
/// does; callers do not pre-check.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount `source` of type `fstype` at `target` with the given options.
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fstype: &str,
        options: &[String],
    ) -> Result<()>;

    /// Unmount whatever is mounted at `target`.
    async fn unmount(&self, target: &Path) -> Result<()>;

    /// Check whether `target` is a mount point.
    async fn is_mounted(&self, target: &Path) -> Result<bool>;

    /// Check whether `target` exists on disk.
    async fn path_exists(&self, target: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(target).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_id() {
        let id = VolumeId::new("pv-mem-1");
        assert_eq!(id.as_str(), "pv-mem-1");
        assert_eq!(id.to_string(), "pv-mem-1");
        assert!(!id.is_empty());
        assert!(VolumeId::from("").is_empty());
    }

    #[test]
    fn test_capacity_declaration_default() {
        let decl = CapacityDeclaration::default();
        assert_eq!(decl.required_bytes, 0);
        assert!(decl.mount_options.is_empty());
    }
}
