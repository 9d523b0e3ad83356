//! Memory-backed volume lifecycle
//!
//! - [`capacity`] - byte capacity to tmpfs size option
//! - [`lifecycle`] - publish / unpublish state transitions

pub mod capacity;
pub mod lifecycle;

pub use capacity::{build_mount_options, MountSizeSpec, SizeUnit, GIB, MIB};
pub use lifecycle::{volume_name_from_target_path, UnpublishOutcome, VolumeLifecycleManager, TMPFS};
