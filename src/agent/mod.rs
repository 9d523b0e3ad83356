//! Node-local volume query agent
//!
//! | Module | Purpose |
//! |---|---|
//! | [`metadata`] | Reads per-volume runtime records from disk |
//! | [`volume_info`] | Normalizes a record into the published shape |
//! | [`query`] | Request handling and failure bodies |
//! | [`server`] | Routes on the query socket |

pub mod metadata;
pub mod query;
pub mod server;
pub mod volume_info;

pub use metadata::{RuntimeMetadataRecord, RuntimeMetadataStore, DEFAULT_RUNTIME_FILE_NAME};
pub use query::{QueryRequest, QueryService, QueryServiceConfig, NULL_RESPONSE, PING_RESPONSE};
pub use server::{QueryRouter, DEFAULT_QUERY_SOCKET, PING_ROUTE, VOLUME_INFO_ROUTE};
pub use volume_info::{normalize, NormalizedVolumeInfo, VolumeKind};
