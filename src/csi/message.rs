//! CSI request/response envelopes carried over the plugin socket.
//!
//! A request is `{"method": "<Rpc>", "params": {...}}`; the reply is
//! `{"result": "<Kind>", "body": ...}`, with `Error` carrying an
//! [`RpcStatus`].

use serde::{Deserialize, Serialize};

use crate::csi::types::*;

/// One RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum CsiRequest {
    // ----- Identity -------------------------------------------------------
    GetPluginInfo,
    GetPluginCapabilities,
    Probe,

    // ----- Controller -----------------------------------------------------
    CreateVolume(CreateVolumeRequest),
    DeleteVolume(DeleteVolumeRequest),
    ControllerPublishVolume(ControllerPublishVolumeRequest),
    ControllerUnpublishVolume(ControllerUnpublishVolumeRequest),
    ControllerExpandVolume(ControllerExpandVolumeRequest),
    ControllerGetCapabilities,

    // ----- Node -----------------------------------------------------------
    NodeStageVolume(NodeStageVolumeRequest),
    NodeUnstageVolume(NodeUnstageVolumeRequest),
    NodePublishVolume(NodePublishVolumeRequest),
    NodeUnpublishVolume(NodeUnpublishVolumeRequest),
    NodeExpandVolume(NodeExpandVolumeRequest),
    NodeGetCapabilities,
    NodeGetInfo,
}

impl CsiRequest {
    /// RPC name, used as a metric and log label.
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetPluginInfo => "GetPluginInfo",
            Self::GetPluginCapabilities => "GetPluginCapabilities",
            Self::Probe => "Probe",
            Self::CreateVolume(_) => "CreateVolume",
            Self::DeleteVolume(_) => "DeleteVolume",
            Self::ControllerPublishVolume(_) => "ControllerPublishVolume",
            Self::ControllerUnpublishVolume(_) => "ControllerUnpublishVolume",
            Self::ControllerExpandVolume(_) => "ControllerExpandVolume",
            Self::ControllerGetCapabilities => "ControllerGetCapabilities",
            Self::NodeStageVolume(_) => "NodeStageVolume",
            Self::NodeUnstageVolume(_) => "NodeUnstageVolume",
            Self::NodePublishVolume(_) => "NodePublishVolume",
            Self::NodeUnpublishVolume(_) => "NodeUnpublishVolume",
            Self::NodeExpandVolume(_) => "NodeExpandVolume",
            Self::NodeGetCapabilities => "NodeGetCapabilities",
            Self::NodeGetInfo => "NodeGetInfo",
        }
    }
}

impl std::fmt::Display for CsiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateVolume(req) => write!(f, "CreateVolume(name={})", req.name),
            Self::DeleteVolume(req) => write!(f, "DeleteVolume({})", req.volume_id),
            Self::NodePublishVolume(req) => {
                write!(f, "NodePublishVolume({}, {})", req.volume_id, req.target_path)
            }
            Self::NodeUnpublishVolume(req) => {
                write!(f, "NodeUnpublishVolume({}, {})", req.volume_id, req.target_path)
            }
            other => f.write_str(other.method()),
        }
    }
}

/// Reply to a [`CsiRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "body")]
pub enum CsiResponse {
    PluginInfo(PluginInfo),
    PluginCapabilities(Vec<PluginCapability>),
    Probe(ProbeResponse),
    Volume(Volume),
    ControllerPublish(ControllerPublishVolumeResponse),
    ControllerExpand(ControllerExpandVolumeResponse),
    ControllerCapabilities(Vec<ControllerServiceCapability>),
    NodeExpand(NodeExpandVolumeResponse),
    NodeCapabilities(Vec<NodeServiceCapability>),
    NodeInfo(NodeGetInfoResponse),
    /// Success with no payload.
    Empty,
    Error(RpcStatus),
}

impl CsiResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"method":"NodePublishVolume","params":{"volume_id":"pv-1","target_path":"/t"}}"#;
        let req: CsiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method(), "NodePublishVolume");
        assert_eq!(req.to_string(), "NodePublishVolume(pv-1, /t)");

        let unit: CsiRequest = serde_json::from_str(r#"{"method":"Probe"}"#).unwrap();
        assert!(matches!(unit, CsiRequest::Probe));
    }

    #[test]
    fn test_error_response_wire_format() {
        let resp = CsiResponse::Error(RpcStatus::new(RpcCode::Internal, "boom"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": "Error", "body": {"code": "Internal", "message": "boom"}})
        );
        assert!(resp.is_error());
        assert_eq!(
            serde_json::to_value(CsiResponse::Empty).unwrap(),
            serde_json::json!({"result": "Empty"})
        );
    }
}
