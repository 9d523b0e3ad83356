//! CSI plugin surface
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Request/response and capability types, RPC status codes |
//! | [`service`] | `CsiIdentity`, `CsiController`, `CsiNode` traits |
//! | [`driver`] | [`MemoryDriver`], the tmpfs implementation |
//! | [`message`] | Envelopes carried over the plugin socket |
//! | [`server`] | Envelope dispatch and HTTP routing |

pub mod driver;
pub mod message;
pub mod server;
pub mod service;
pub mod types;

pub use driver::{DriverConfig, MemoryDriver, DEFAULT_DRIVER_NAME};
pub use message::{CsiRequest, CsiResponse};
pub use server::{CsiRouter, CSI_ROUTE};
pub use service::{CsiController, CsiIdentity, CsiNode};
pub use types::{RpcCode, RpcStatus};
