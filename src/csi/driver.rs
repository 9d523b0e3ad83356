//! Memory volume driver
//!
//! Implements the Identity, Controller and Node services. Controller calls
//! only do bookkeeping; the node side delegates to
//! [`VolumeLifecycleManager`].

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::csi::service::{CsiController, CsiIdentity, CsiNode};
use crate::csi::types::*;
use crate::domain::ports::VolumeId;
use crate::error::{Error, Result};
use crate::logs::{Component, LogStatus};
use crate::volume::{UnpublishOutcome, VolumeLifecycleManager};

/// Default CSI driver name.
pub const DEFAULT_DRIVER_NAME: &str = "mem.csi.memvol.io";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the memory driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Driver name registered with the kubelet
    pub name: String,

    /// Version reported by GetPluginInfo
    pub version: String,

    /// Node this plugin instance runs on
    pub node_id: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DRIVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_id: String::new(),
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

/// CSI driver for tmpfs-backed ephemeral volumes.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    config: DriverConfig,
    lifecycle: VolumeLifecycleManager,
    controller_capabilities: Vec<ControllerServiceCapability>,
}

impl MemoryDriver {
    pub fn new(config: DriverConfig, lifecycle: VolumeLifecycleManager) -> Self {
        Self {
            config,
            lifecycle,
            controller_capabilities: vec![
                ControllerServiceCapability::CreateDeleteVolume,
                ControllerServiceCapability::ExpandVolume,
            ],
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn validate_controller_capability(&self, capability: ControllerServiceCapability) -> Result<()> {
        if self.controller_capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "unsupported controller capability: {:?}",
                capability
            )))
        }
    }
}

#[async_trait]
impl CsiIdentity for MemoryDriver {
    async fn get_plugin_info(&self) -> Result<PluginInfo> {
        Ok(PluginInfo {
            name: self.config.name.clone(),
            vendor_version: self.config.version.clone(),
        })
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>> {
        Ok(vec![PluginCapability::ControllerService])
    }

    async fn probe(&self) -> Result<ProbeResponse> {
        Ok(ProbeResponse { ready: true })
    }
}

#[async_trait]
impl CsiController for MemoryDriver {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume> {
        self.validate_controller_capability(ControllerServiceCapability::CreateDeleteVolume)?;
        if req.name.is_empty() {
            return Err(Error::InvalidArgument(
                "Volume Name cannot be empty".to_string(),
            ));
        }
        if req.volume_capabilities.is_empty() {
            return Err(Error::InvalidArgument(
                "Volume Capabilities cannot be empty".to_string(),
            ));
        }

        let capacity_bytes = req
            .capacity_range
            .map(|range| range.required_bytes)
            .unwrap_or_default();

        info!(
            component = %Component::Mem,
            status = %LogStatus::Ok,
            capacity_bytes,
            "Created volume"
        );
        Ok(Volume {
            volume_id: req.name,
            capacity_bytes,
            volume_context: req.parameters,
        })
    }

    async fn delete_volume(&self, req: DeleteVolumeRequest) -> Result<()> {
        info!(component = %Component::Mem, volume_id = %req.volume_id, "Deleted volume");
        Ok(())
    }

    async fn controller_publish_volume(
        &self,
        req: ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse> {
        info!(
            component = %Component::Mem,
            volume_id = %req.volume_id,
            node_id = %req.node_id,
            "ControllerPublish is a no-op"
        );
        Ok(ControllerPublishVolumeResponse::default())
    }

    async fn controller_unpublish_volume(
        &self,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<()> {
        info!(
            component = %Component::Mem,
            volume_id = %req.volume_id,
            node_id = %req.node_id,
            "ControllerUnpublish is a no-op"
        );
        Ok(())
    }

    async fn controller_expand_volume(
        &self,
        req: ControllerExpandVolumeRequest,
    ) -> Result<ControllerExpandVolumeResponse> {
        let capacity_bytes = req
            .capacity_range
            .map(|range| range.required_bytes)
            .unwrap_or_default();
        info!(
            component = %Component::Mem,
            volume_id = %req.volume_id,
            capacity_bytes,
            "ControllerExpand accepted"
        );
        Ok(ControllerExpandVolumeResponse {
            capacity_bytes,
            node_expansion_required: true,
        })
    }

    async fn controller_get_capabilities(&self) -> Result<Vec<ControllerServiceCapability>> {
        Ok(self.controller_capabilities.clone())
    }
}

#[async_trait]
impl CsiNode for MemoryDriver {
    async fn node_stage_volume(&self, req: NodeStageVolumeRequest) -> Result<()> {
        debug!(volume_id = %req.volume_id, "NodeStage is a no-op");
        Ok(())
    }

    async fn node_unstage_volume(&self, req: NodeUnstageVolumeRequest) -> Result<()> {
        debug!(volume_id = %req.volume_id, "NodeUnstage is a no-op");
        Ok(())
    }

    async fn node_publish_volume(&self, req: NodePublishVolumeRequest) -> Result<()> {
        if req.volume_id.is_empty() {
            return Err(Error::InvalidArgument("volumeId is empty".to_string()));
        }
        let volume_id = VolumeId::new(req.volume_id);
        self.lifecycle.publish(&volume_id, &req.target_path).await?;
        Ok(())
    }

    async fn node_unpublish_volume(&self, req: NodeUnpublishVolumeRequest) -> Result<()> {
        let outcome = self.lifecycle.unpublish(&req.target_path).await?;
        if outcome == UnpublishOutcome::NotFound {
            debug!(
                volume_id = %req.volume_id,
                target_path = %req.target_path,
                "Target path already removed"
            );
        }
        Ok(())
    }

    async fn node_get_capabilities(&self) -> Result<Vec<NodeServiceCapability>> {
        Ok(self.lifecycle.capabilities())
    }

    async fn node_expand_volume(
        &self,
        req: NodeExpandVolumeRequest,
    ) -> Result<NodeExpandVolumeResponse> {
        self.lifecycle
            .expand(&VolumeId::new(req.volume_id), &req.volume_path)
            .await?;
        Ok(NodeExpandVolumeResponse::default())
    }

    async fn node_get_info(&self) -> Result<NodeGetInfoResponse> {
        Ok(NodeGetInfoResponse {
            node_id: self.config.node_id.clone(),
            max_volumes_per_node: 0,
            accessible_topology: Some(Topology::default()),
        })
    }
}
