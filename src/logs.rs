//! Log status table
//!
//! Failure logs carry a stable status code plus a short reason and an
//! operator-facing recommendation, so that node logs can be grepped and
//! matched against runbooks without parsing free-form messages.
//!
//! ```ignore
//! error!(
//!     component = %Component::Mem,
//!     status = LogStatus::GetPvFailed.code(),
//!     recommend = LogStatus::GetPvFailed.recommend(),
//!     volume_id = %volume_id,
//!     "Failed to read volume capacity"
//! );
//! ```

use std::fmt;

/// Subsystem emitting a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Memory volume CSI driver
    Mem,
    /// Node-local query agent
    Agent,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Mem => write!(f, "mem"),
            Component::Agent => write!(f, "agent"),
        }
    }
}

/// Status codes attached to log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Ok,
    NotFound,
    InternalError,
    VolumeTypeError,
    SocketError,
    GetKubeConfigFailed,
    GetPvFailed,
    InvalidCapacity,
    MountFailed,
    UnmountFailed,
}

impl LogStatus {
    /// Numeric code, stable across releases.
    pub fn code(self) -> u32 {
        match self {
            LogStatus::Ok => 0,
            LogStatus::NotFound => 1,
            LogStatus::InternalError => 2,
            LogStatus::VolumeTypeError => 3,
            LogStatus::SocketError => 4,
            LogStatus::GetKubeConfigFailed => 100,
            LogStatus::GetPvFailed => 101,
            LogStatus::InvalidCapacity => 102,
            LogStatus::MountFailed => 200,
            LogStatus::UnmountFailed => 201,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            LogStatus::Ok => "success",
            LogStatus::NotFound => "resource not found",
            LogStatus::InternalError => "internal error",
            LogStatus::VolumeTypeError => "unknown volume type",
            LogStatus::SocketError => "socket error",
            LogStatus::GetKubeConfigFailed => "cluster config unavailable",
            LogStatus::GetPvFailed => "persistent volume lookup failed",
            LogStatus::InvalidCapacity => "volume capacity unusable",
            LogStatus::MountFailed => "mount failed",
            LogStatus::UnmountFailed => "unmount failed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            LogStatus::Ok => "operation completed",
            LogStatus::NotFound => "the requested volume or record does not exist on this node",
            LogStatus::InternalError => "an unexpected error occurred while serving the request",
            LogStatus::VolumeTypeError => "the runtime record declares a volume type this agent cannot describe",
            LogStatus::SocketError => "the local socket could not be bound, read or written",
            LogStatus::GetKubeConfigFailed => "no in-cluster or kubeconfig credentials could be loaded",
            LogStatus::GetPvFailed => "the persistent volume object could not be fetched from the API server",
            LogStatus::InvalidCapacity => "the declared capacity is zero or smaller than one mebibyte",
            LogStatus::MountFailed => "the tmpfs mount syscall returned an error",
            LogStatus::UnmountFailed => "the umount syscall returned an error",
        }
    }

    /// Suggested operator action; empty when none applies.
    pub fn recommend(self) -> &'static str {
        match self {
            LogStatus::Ok | LogStatus::InternalError => "",
            LogStatus::NotFound => "check that the volume was provisioned on this node",
            LogStatus::VolumeTypeError => "check the volumetype field of the runtime record",
            LogStatus::SocketError => "check permissions on the socket directory",
            LogStatus::GetKubeConfigFailed => "check the service account token or KUBECONFIG",
            LogStatus::GetPvFailed => "check RBAC for persistentvolumes get and the API server health",
            LogStatus::InvalidCapacity => "declare a storage capacity of at least 1Mi on the volume",
            LogStatus::MountFailed => "check that the plugin runs privileged with the kubelet dir mounted",
            LogStatus::UnmountFailed => "check for processes still holding files under the target path",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
