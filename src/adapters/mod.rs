//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │            CapacityLookup   │   Mounter                     │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ KubeCapacityLookup │ SystemMounter                          │ │
//! │  │ StaticCapacityLookup │ InMemoryMounter (tests)              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use memvol::adapters::{KubeCapacityLookup, SystemMounter};
//! use memvol::volume::VolumeLifecycleManager;
//!
//! let manager = VolumeLifecycleManager::new(
//!     Arc::new(KubeCapacityLookup::new(client)),
//!     Arc::new(SystemMounter::new()),
//! );
//! ```

mod kubernetes;
mod memory;
mod mount;

pub use kubernetes::{parse_quantity, KubeCapacityLookup};
pub use memory::{InMemoryMounter, MountRecord, StaticCapacityLookup};
pub use mount::{parse_mount_points, split_mount_options, SystemMounter, PROC_MOUNTS};
