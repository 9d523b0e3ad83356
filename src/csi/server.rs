//! CSI plugin socket.
//!
//! Accepts one [`CsiRequest`] envelope per HTTP POST and replies with a
//! [`CsiResponse`]. Failures are reported inside the envelope, never as
//! transport errors.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use tracing::{debug, warn};

use crate::csi::message::{CsiRequest, CsiResponse};
use crate::csi::service::{CsiController, CsiIdentity, CsiNode};
use crate::csi::types::{RpcCode, RpcStatus};
use crate::error::Result;
use crate::metrics;
use crate::server::{text_response, RouteHandler};

/// Path the envelopes are posted to.
pub const CSI_ROUTE: &str = "/csi";

/// Routes envelopes to a driver implementing all three CSI services.
pub struct CsiRouter<T> {
    driver: Arc<T>,
}

impl<T> CsiRouter<T>
where
    T: CsiIdentity + CsiController + CsiNode + 'static,
{
    pub fn new(driver: Arc<T>) -> Self {
        Self { driver }
    }

    /// Decode an envelope and run it.
    pub async fn handle_envelope(&self, body: &[u8]) -> CsiResponse {
        match serde_json::from_slice::<CsiRequest>(body) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "Malformed CSI request");
                CsiResponse::Error(RpcStatus::new(
                    RpcCode::InvalidArgument,
                    format!("malformed request: {}", e),
                ))
            }
        }
    }

    /// Run one request against the driver.
    pub async fn dispatch(&self, request: CsiRequest) -> CsiResponse {
        debug!(%request, "CSI request received");
        let method = request.method();
        let driver = self.driver.as_ref();

        let result: Result<CsiResponse> = match request {
            // --- Identity ---------------------------------------------------
            CsiRequest::GetPluginInfo => driver.get_plugin_info().await.map(CsiResponse::PluginInfo),
            CsiRequest::GetPluginCapabilities => driver
                .get_plugin_capabilities()
                .await
                .map(CsiResponse::PluginCapabilities),
            CsiRequest::Probe => driver.probe().await.map(CsiResponse::Probe),

            // --- Controller -------------------------------------------------
            CsiRequest::CreateVolume(req) => driver.create_volume(req).await.map(CsiResponse::Volume),
            CsiRequest::DeleteVolume(req) => {
                driver.delete_volume(req).await.map(|()| CsiResponse::Empty)
            }
            CsiRequest::ControllerPublishVolume(req) => driver
                .controller_publish_volume(req)
                .await
                .map(CsiResponse::ControllerPublish),
            CsiRequest::ControllerUnpublishVolume(req) => driver
                .controller_unpublish_volume(req)
                .await
                .map(|()| CsiResponse::Empty),
            CsiRequest::ControllerExpandVolume(req) => driver
                .controller_expand_volume(req)
                .await
                .map(CsiResponse::ControllerExpand),
            CsiRequest::ControllerGetCapabilities => driver
                .controller_get_capabilities()
                .await
                .map(CsiResponse::ControllerCapabilities),

            // --- Node -------------------------------------------------------
            CsiRequest::NodeStageVolume(req) => {
                driver.node_stage_volume(req).await.map(|()| CsiResponse::Empty)
            }
            CsiRequest::NodeUnstageVolume(req) => {
                driver.node_unstage_volume(req).await.map(|()| CsiResponse::Empty)
            }
            CsiRequest::NodePublishVolume(req) => {
                driver.node_publish_volume(req).await.map(|()| CsiResponse::Empty)
            }
            CsiRequest::NodeUnpublishVolume(req) => driver
                .node_unpublish_volume(req)
                .await
                .map(|()| CsiResponse::Empty),
            CsiRequest::NodeExpandVolume(req) => driver
                .node_expand_volume(req)
                .await
                .map(CsiResponse::NodeExpand),
            CsiRequest::NodeGetCapabilities => driver
                .node_get_capabilities()
                .await
                .map(CsiResponse::NodeCapabilities),
            CsiRequest::NodeGetInfo => driver.node_get_info().await.map(CsiResponse::NodeInfo),
        };

        match result {
            Ok(response) => {
                metrics::record_rpc(method, true);
                response
            }
            Err(e) => {
                warn!(method, error = %e, "CSI request failed");
                metrics::record_rpc(method, false);
                CsiResponse::Error(e.into())
            }
        }
    }
}

#[async_trait]
impl<T> RouteHandler for CsiRouter<T>
where
    T: CsiIdentity + CsiController + CsiNode + 'static,
{
    async fn handle(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
        if path != CSI_ROUTE {
            return text_response(StatusCode::NOT_FOUND, "404 page not found\n");
        }
        if *method != Method::POST {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
        }

        let reply = self.handle_envelope(&body).await;
        match serde_json::to_vec(&reply) {
            Ok(payload) => {
                let mut response = text_response(StatusCode::OK, payload);
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}
