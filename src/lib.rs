//! memvol - Memory-backed ephemeral volumes for Kubernetes nodes
//!
//! A CSI node/controller plugin that publishes each volume as a tmpfs mount
//! bounded by the capacity declared on its PersistentVolume, plus a
//! node-local agent that tells other processes how a volume was
//! materialized.
//!
//! # Architecture
//!
//! ```text
//! kubelet ──▶ CSI socket ──▶ MemoryDriver ──▶ VolumeLifecycleManager ──▶ Mounter (tmpfs)
//!                                                   │
//!                                                   └──▶ CapacityLookup (PersistentVolume)
//!
//! local caller ──▶ query socket ──▶ QueryService ──▶ RuntimeMetadataStore ──▶ normalize
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Kubernetes, mount-syscall and in-memory implementations of the ports
//! - [`agent`] - Volume info query agent
//! - [`csi`] - CSI services, envelopes and dispatch
//! - [`domain`] - Value objects and capability ports
//! - [`error`] - Error types
//! - [`logs`] - Log status table
//! - [`metrics`] - Prometheus counters and the metrics server
//! - [`server`] - HTTP/1 accept loops
//! - [`volume`] - Capacity conversion and the volume lifecycle

pub mod adapters;
pub mod agent;
pub mod csi;
pub mod domain;
pub mod error;
pub mod logs;
pub mod metrics;
pub mod server;
pub mod volume;

// Re-export commonly used types
pub use agent::{QueryService, QueryServiceConfig};
pub use csi::{DriverConfig, MemoryDriver};
pub use error::{Error, Result};
pub use volume::VolumeLifecycleManager;
