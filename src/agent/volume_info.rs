//! Volume Info Normalizer
//!
//! Turns a raw runtime record into the public, type-specific shape. The
//! record's `volumetype` picks a [`VolumeKind`]; anything else is refused
//! rather than returned half-filled.

use serde::{Deserialize, Serialize};

use crate::agent::metadata::RuntimeMetadataRecord;
use crate::error::{Error, Result};

/// NFS protocol version when the record does not name one.
pub const DEFAULT_NFS_VERS: &str = "3";
/// NFS mount mode when the record does not name one.
pub const DEFAULT_NFS_MODE: &str = "";
/// NFS mount options when the record does not name any.
pub const DEFAULT_NFS_OPTIONS: &str = "noresvport,nolock,tcp";

/// Volume types the agent can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Block,
    Nfs,
}

impl VolumeKind {
    /// Match a lower-cased discriminator value.
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "block" => Some(VolumeKind::Block),
            "nfs" => Some(VolumeKind::Nfs),
            _ => None,
        }
    }
}

impl std::fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeKind::Block => write!(f, "block"),
            VolumeKind::Nfs => write!(f, "nfs"),
        }
    }
}

/// Published description of how a volume was materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "volumeType", rename_all = "lowercase")]
pub enum NormalizedVolumeInfo {
    Block {
        /// Copied from the record's `device`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<String>,
    },
    Nfs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        vers: String,
        mode: String,
        options: String,
    },
}

impl NormalizedVolumeInfo {
    pub fn kind(&self) -> VolumeKind {
        match self {
            NormalizedVolumeInfo::Block { .. } => VolumeKind::Block,
            NormalizedVolumeInfo::Nfs { .. } => VolumeKind::Nfs,
        }
    }

    /// Single-line JSON body.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Map a record of a recognized type onto [`NormalizedVolumeInfo`].
///
/// Each NFS default applies on its own when its field is missing.
pub fn normalize(record: &RuntimeMetadataRecord) -> Result<NormalizedVolumeInfo> {
    let discriminator = record.volume_type().unwrap_or_default();
    let kind = VolumeKind::from_discriminator(discriminator)
        .ok_or_else(|| Error::UnrecognizedVolumeType(discriminator.to_string()))?;

    let field = |name: &str| record.get(name).map(str::to_string);
    let field_or = |name: &str, default: &str| {
        record.get(name).unwrap_or(default).to_string()
    };

    Ok(match kind {
        VolumeKind::Block => NormalizedVolumeInfo::Block {
            path: field("device"),
            identity: field("identity"),
        },
        VolumeKind::Nfs => NormalizedVolumeInfo::Nfs {
            server: field("server"),
            path: field("path"),
            vers: field_or("vers", DEFAULT_NFS_VERS),
            mode: field_or("mode", DEFAULT_NFS_MODE),
            options: field_or("options", DEFAULT_NFS_OPTIONS),
        },
    })
}
