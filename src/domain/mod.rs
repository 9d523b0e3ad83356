//! Domain Layer
//!
//! Value objects and the capability ports the volume lifecycle is written
//! against.
//!
//! # Usage
//!
//! ```ignore
//! use memvol::domain::ports::{CapacityLookup, Mounter, VolumeId};
//!
//! async fn size_of<C: CapacityLookup>(lookup: &C, id: &VolumeId) -> Result<u64> {
//!     Ok(lookup.lookup(id).await?.required_bytes)
//! }
//! ```

pub mod ports;

pub use ports::{CapacityDeclaration, CapacityLookup, Mounter, VolumeId};
