//! Query Service
//!
//! Resolves a volume-info request against the node's runtime records.
//! Failures never surface as transport errors: the reply body is either
//! the normalized JSON, `null`, or `no found volume: <path>`.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::agent::metadata::{RuntimeMetadataStore, DEFAULT_RUNTIME_FILE_NAME};
use crate::agent::volume_info::normalize;
use crate::error::Error;
use crate::logs::{Component, LogStatus};
use crate::metrics;

/// Body returned for every failure except a missing record.
pub const NULL_RESPONSE: &str = "null";
/// Body returned by the liveness probe.
pub const PING_RESPONSE: &str = "Ping successful";
/// Prefix of the body returned for a missing record.
pub const NOT_FOUND_PREFIX: &str = "no found volume: ";

/// A volume-info request.
///
/// Only `identity` drives the lookup. The pod fields are decoded and kept
/// for a pod-runtime lookup that is not served yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub identity: String,
    #[serde(rename = "podName")]
    pub pod_name: String,
    #[serde(rename = "podNameSpace", alias = "podNamespace")]
    pub pod_namespace: String,
}

/// Query service configuration
#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    /// File name of the runtime record inside each volume directory
    pub runtime_file_name: String,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            runtime_file_name: DEFAULT_RUNTIME_FILE_NAME.to_string(),
        }
    }
}

/// Answers volume-info and ping requests. Holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct QueryService {
    store: RuntimeMetadataStore,
}

impl QueryService {
    pub fn new(config: QueryServiceConfig) -> Self {
        Self {
            store: RuntimeMetadataStore::new(config.runtime_file_name),
        }
    }

    pub fn store(&self) -> &RuntimeMetadataStore {
        &self.store
    }

    /// Handle a raw request body and produce the reply body.
    pub async fn volume_info(&self, body: &[u8]) -> String {
        let request: QueryRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                error!(
                    component = %Component::Agent,
                    status = %LogStatus::InternalError,
                    reason = LogStatus::InternalError.reason(),
                    detail = LogStatus::InternalError.message(),
                    error = %e,
                    "Failed to parse volume info request"
                );
                metrics::record_query("volumeinfo", "bad_request");
                return NULL_RESPONSE.to_string();
            }
        };
        self.lookup(&request).await
    }

    /// Resolve a decoded request.
    pub async fn lookup(&self, request: &QueryRequest) -> String {
        if request.identity.is_empty() {
            metrics::record_query("volumeinfo", "empty_identity");
            return NULL_RESPONSE.to_string();
        }

        let resolved = self
            .store
            .load(&request.identity)
            .await
            .and_then(|record| normalize(&record))
            .and_then(|info| info.to_json());

        let body = match resolved {
            Ok(body) => body,
            Err(Error::NotFound(path)) => {
                warn!(
                    component = %Component::Agent,
                    status = %LogStatus::NotFound,
                    reason = LogStatus::NotFound.reason(),
                    detail = LogStatus::NotFound.message(),
                    recommend = LogStatus::NotFound.recommend(),
                    path = %path,
                    "Volume not found"
                );
                metrics::record_query("volumeinfo", "not_found");
                return format!("{}{}", NOT_FOUND_PREFIX, path);
            }
            Err(Error::UnrecognizedVolumeType(volume_type)) => {
                error!(
                    component = %Component::Agent,
                    status = %LogStatus::VolumeTypeError,
                    reason = LogStatus::VolumeTypeError.reason(),
                    detail = LogStatus::VolumeTypeError.message(),
                    recommend = LogStatus::VolumeTypeError.recommend(),
                    identity = %request.identity,
                    volume_type = %volume_type,
                    "Volume type is unknown"
                );
                metrics::record_query("volumeinfo", "unrecognized_type");
                return NULL_RESPONSE.to_string();
            }
            Err(e) => {
                error!(
                    component = %Component::Agent,
                    status = %LogStatus::InternalError,
                    reason = LogStatus::InternalError.reason(),
                    detail = LogStatus::InternalError.message(),
                    identity = %request.identity,
                    error = %e,
                    "Failed to resolve volume info"
                );
                metrics::record_query("volumeinfo", "error");
                return NULL_RESPONSE.to_string();
            }
        };

        info!(component = %Component::Agent, response = %body, "Sending volume info");
        metrics::record_query("volumeinfo", "found");
        body
    }

    /// Liveness probe; touches nothing.
    pub fn ping(&self) -> &'static str {
        metrics::record_query("ping", "ok");
        PING_RESPONSE
    }
}
