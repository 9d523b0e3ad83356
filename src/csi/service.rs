//! CSI service traits.
//!
//! One trait per CSI service. The driver implements all three; the
//! transport in [`crate::csi::server`] dispatches envelopes to them and
//! maps errors onto [`RpcStatus`](crate::csi::types::RpcStatus).

use async_trait::async_trait;

use crate::csi::types::*;
use crate::error::Result;

/// Identity service: plugin discovery and health.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    async fn get_plugin_info(&self) -> Result<PluginInfo>;

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>>;

    /// Liveness probe.
    async fn probe(&self) -> Result<ProbeResponse>;
}

/// Controller service: cluster-level volume bookkeeping.
#[async_trait]
pub trait CsiController: Send + Sync {
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume>;

    async fn delete_volume(&self, req: DeleteVolumeRequest) -> Result<()>;

    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse>;

    async fn controller_unpublish_volume(&self, req: ControllerUnpublishVolumeRequest)
        -> Result<()>;

    async fn controller_expand_volume(
        &self,
        req: ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse>;

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerServiceCapability>>;
}

/// Node service: local mount and unmount.
#[async_trait]
pub trait CsiNode: Send + Sync {
    async fn node_stage_volume(&self, req: NodeStageVolumeRequest) -> Result<()>;

    async fn node_unstage_volume(&self, req: NodeUnstageVolumeRequest) -> Result<()>;

    async fn node_publish_volume(&self, req: NodePublishVolumeRequest) -> Result<()>;

    /// Idempotent: succeeds when the target is already gone or unmounted.
    async fn node_unpublish_volume(&self, req: NodeUnpublishVolumeRequest) -> Result<()>;

    async fn node_get_capabilities(&self) -> Result<Vec<NodeServiceCapability>>;

    async fn node_expand_volume(
        &self,
        req: NodeExpandVolumeRequest,
    ) -> Result<NodeExpandVolumeResponse>;

    async fn node_get_info(&self) -> Result<NodeGetInfoResponse>;
}
