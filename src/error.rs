//! Error types for the memory volume driver and query agent

use thiserror::Error;

use crate::csi::types::{RpcCode, RpcStatus};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the driver or the query agent
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request or target
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// The cluster capacity lookup failed
    #[error("Capacity lookup failed for volume {volume_id}: {reason}")]
    UpstreamLookupFailed { volume_id: String, reason: String },

    /// The volume declares no capacity
    #[error("Volume {volume_id} declares no capacity")]
    CapacityMissing { volume_id: String },

    /// The declared capacity is below one mebibyte
    #[error("Capacity of {bytes} bytes is too small to express as a mount size")]
    CapacityTooSmall { bytes: u64 },

    /// Mounting the backing filesystem failed
    #[error("Mount failed at {path}: {reason}")]
    MountFailed { path: String, reason: String },

    /// Unmounting the backing filesystem failed
    #[error("Unmount failed at {path}: {reason}")]
    UnmountFailed { path: String, reason: String },

    // =========================================================================
    // Query Agent Errors
    // =========================================================================
    /// A record or path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A persisted runtime-metadata record could not be decoded
    #[error("Failed to decode record {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The record's volumetype discriminator is not a known type
    #[error("Unrecognized volume type: {0:?}")]
    UnrecognizedVolumeType(String),

    // =========================================================================
    // Process Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code reported to the orchestrator for this error.
    pub fn code(&self) -> RpcCode {
        match self {
            Error::InvalidArgument(_) => RpcCode::InvalidArgument,
            Error::NotFound(_) => RpcCode::NotFound,
            _ => RpcCode::Internal,
        }
    }
}

impl From<Error> for RpcStatus {
    fn from(err: Error) -> Self {
        RpcStatus {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(
            Error::InvalidArgument("targetPath is empty".into()).code(),
            RpcCode::InvalidArgument
        );
        assert_eq!(Error::NotFound("/x".into()).code(), RpcCode::NotFound);
        assert_eq!(
            Error::CapacityTooSmall { bytes: 10 }.code(),
            RpcCode::Internal
        );
        assert_eq!(
            Error::MountFailed {
                path: "/x".into(),
                reason: "EPERM".into()
            }
            .code(),
            RpcCode::Internal
        );
    }

    #[test]
    fn test_status_carries_message() {
        let status: RpcStatus = Error::CapacityMissing {
            volume_id: "pv-1".into(),
        }
        .into();
        assert_eq!(status.code, RpcCode::Internal);
        assert_eq!(status.message, "Volume pv-1 declares no capacity");
    }
}
