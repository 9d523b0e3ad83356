//! Volume lifecycle integration tests
//!
//! Drives the memory driver through the CSI request envelope, with the
//! cluster and the mount table replaced by in-memory fakes.

use std::path::Path;
use std::sync::Arc;

use memvol::adapters::{InMemoryMounter, StaticCapacityLookup};
use memvol::csi::types::*;
use memvol::csi::{CsiRequest, CsiResponse, CsiRouter, DriverConfig, MemoryDriver};
use memvol::domain::CapacityDeclaration;
use memvol::volume::{VolumeLifecycleManager, GIB, MIB};

const TARGET: &str = "/var/lib/kubelet/pods/pod-uid/volumes/kubernetes.io~csi/pv-mem/mount";

struct Harness {
    router: CsiRouter<MemoryDriver>,
    mounter: Arc<InMemoryMounter>,
    capacity: Arc<StaticCapacityLookup>,
}

fn harness() -> Harness {
    let mounter = Arc::new(InMemoryMounter::new());
    let capacity = Arc::new(StaticCapacityLookup::new());
    let lifecycle = VolumeLifecycleManager::new(capacity.clone(), mounter.clone());
    let config = DriverConfig {
        node_id: "node-a".to_string(),
        ..Default::default()
    };
    Harness {
        router: CsiRouter::new(Arc::new(MemoryDriver::new(config, lifecycle))),
        mounter,
        capacity,
    }
}

fn publish(volume_id: &str, target_path: &str) -> CsiRequest {
    CsiRequest::NodePublishVolume(NodePublishVolumeRequest {
        volume_id: volume_id.to_string(),
        target_path: target_path.to_string(),
        ..Default::default()
    })
}

fn unpublish(target_path: &str) -> CsiRequest {
    CsiRequest::NodeUnpublishVolume(NodeUnpublishVolumeRequest {
        volume_id: "pv-mem".to_string(),
        target_path: target_path.to_string(),
    })
}

fn error_code(response: &CsiResponse) -> Option<RpcCode> {
    match response {
        CsiResponse::Error(status) => Some(status.code),
        _ => None,
    }
}

#[tokio::test]
async fn test_publish_then_unpublish() {
    let h = harness();
    h.capacity.insert(
        "pv-mem",
        CapacityDeclaration::new(2 * GIB, vec!["nosuid".to_string()]),
    );

    let reply = h.router.dispatch(publish("pv-mem", TARGET)).await;
    assert_eq!(reply, CsiResponse::Empty);

    let record = h.mounter.mount_at(Path::new(TARGET)).unwrap();
    assert_eq!(record.source, "tmpfs");
    assert_eq!(record.fstype, "tmpfs");
    assert_eq!(record.options, vec!["nosuid".to_string(), "size=2g".to_string()]);

    let reply = h.router.dispatch(unpublish(TARGET)).await;
    assert_eq!(reply, CsiResponse::Empty);
    assert!(h.mounter.mount_at(Path::new(TARGET)).is_none());
    assert_eq!(h.mounter.unmount_calls(), 1);

    // Already unmounted: still succeeds, nothing else is unmounted.
    let reply = h.router.dispatch(unpublish(TARGET)).await;
    assert_eq!(reply, CsiResponse::Empty);
    assert_eq!(h.mounter.unmount_calls(), 1);
}

#[tokio::test]
async fn test_sub_gib_capacity_uses_mebibytes() {
    let h = harness();
    h.capacity
        .insert("pv-mem", CapacityDeclaration::new(512 * MIB, Vec::new()));

    let reply = h.router.dispatch(publish("pv-mem", TARGET)).await;
    assert_eq!(reply, CsiResponse::Empty);
    assert_eq!(
        h.mounter.mount_at(Path::new(TARGET)).unwrap().options,
        vec!["size=512m".to_string()]
    );
}

#[tokio::test]
async fn test_unpublish_missing_path_succeeds() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("never-created");

    let reply = h.router.dispatch(unpublish(gone.to_str().unwrap())).await;
    assert_eq!(reply, CsiResponse::Empty);
    assert_eq!(h.mounter.unmount_calls(), 0);
}

#[tokio::test]
async fn test_publish_rejections() {
    let h = harness();

    let reply = h.router.dispatch(publish("", TARGET)).await;
    assert_eq!(error_code(&reply), Some(RpcCode::InvalidArgument));

    let reply = h.router.dispatch(publish("pv-mem", "")).await;
    assert_eq!(error_code(&reply), Some(RpcCode::InvalidArgument));

    // Not declared in the cluster.
    let reply = h.router.dispatch(publish("pv-mem", TARGET)).await;
    assert_eq!(error_code(&reply), Some(RpcCode::Internal));

    h.capacity
        .insert("pv-zero", CapacityDeclaration::new(0, Vec::new()));
    let reply = h.router.dispatch(publish("pv-zero", TARGET)).await;
    assert_eq!(error_code(&reply), Some(RpcCode::Internal));

    h.capacity
        .insert("pv-tiny", CapacityDeclaration::new(MIB - 1, Vec::new()));
    let reply = h.router.dispatch(publish("pv-tiny", TARGET)).await;
    assert_eq!(error_code(&reply), Some(RpcCode::Internal));

    assert_eq!(h.mounter.mount_calls(), 0);
}

#[tokio::test]
async fn test_mount_failure_is_internal() {
    let h = harness();
    h.capacity
        .insert("pv-mem", CapacityDeclaration::new(GIB, Vec::new()));
    h.mounter.fail_mounts("permission denied");

    let reply = h.router.dispatch(publish("pv-mem", TARGET)).await;
    match reply {
        CsiResponse::Error(status) => {
            assert_eq!(status.code, RpcCode::Internal);
            assert!(status.message.contains("permission denied"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unmount_failure_is_internal() {
    let h = harness();
    h.capacity
        .insert("pv-mem", CapacityDeclaration::new(GIB, Vec::new()));
    assert_eq!(h.router.dispatch(publish("pv-mem", TARGET)).await, CsiResponse::Empty);

    h.mounter.fail_unmounts("device busy");
    let reply = h.router.dispatch(unpublish(TARGET)).await;
    assert_eq!(error_code(&reply), Some(RpcCode::Internal));
    assert!(h.mounter.mount_at(Path::new(TARGET)).is_some());
}

#[tokio::test]
async fn test_double_publish_follows_mounter_remount() {
    // The manager does not pre-check mount state; the in-memory mounter
    // remounts in place, so the second publish replaces the first.
    let h = harness();
    h.capacity
        .insert("pv-mem", CapacityDeclaration::new(GIB, Vec::new()));
    assert_eq!(h.router.dispatch(publish("pv-mem", TARGET)).await, CsiResponse::Empty);

    h.capacity
        .insert("pv-mem", CapacityDeclaration::new(3 * GIB, Vec::new()));
    assert_eq!(h.router.dispatch(publish("pv-mem", TARGET)).await, CsiResponse::Empty);

    assert_eq!(h.mounter.mount_calls(), 2);
    assert_eq!(
        h.mounter.mount_at(Path::new(TARGET)).unwrap().options,
        vec!["size=3g".to_string()]
    );
}

#[tokio::test]
async fn test_capabilities_and_info() {
    let h = harness();

    assert_eq!(
        h.router.dispatch(CsiRequest::NodeGetCapabilities).await,
        CsiResponse::NodeCapabilities(vec![
            NodeServiceCapability::StageUnstageVolume,
            NodeServiceCapability::ExpandVolume,
        ])
    );
    assert_eq!(
        h.router.dispatch(CsiRequest::ControllerGetCapabilities).await,
        CsiResponse::ControllerCapabilities(vec![
            ControllerServiceCapability::CreateDeleteVolume,
            ControllerServiceCapability::ExpandVolume,
        ])
    );

    match h.router.dispatch(CsiRequest::NodeGetInfo).await {
        CsiResponse::NodeInfo(info) => assert_eq!(info.node_id, "node-a"),
        other => panic!("expected node info, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stage_and_expand_are_no_ops() {
    let h = harness();

    let stage = CsiRequest::NodeStageVolume(NodeStageVolumeRequest {
        volume_id: "pv-mem".to_string(),
        staging_target_path: "/staging".to_string(),
        ..Default::default()
    });
    assert_eq!(h.router.dispatch(stage).await, CsiResponse::Empty);

    let expand = CsiRequest::NodeExpandVolume(NodeExpandVolumeRequest {
        volume_id: "pv-mem".to_string(),
        volume_path: TARGET.to_string(),
        capacity_range: Some(CapacityRange {
            required_bytes: 4 * GIB,
            limit_bytes: 0,
        }),
    });
    assert!(!h.router.dispatch(expand).await.is_error());
    assert_eq!(h.mounter.mount_calls(), 0);
}

#[tokio::test]
async fn test_create_volume_over_the_wire() {
    let h = harness();
    let body = br#"{
        "method": "CreateVolume",
        "params": {
            "name": "pv-mem",
            "capacity_range": {"required_bytes": 1073741824},
            "volume_capabilities": [{"access_mode": "SingleNodeWriter"}]
        }
    }"#;

    match h.router.handle_envelope(body).await {
        CsiResponse::Volume(volume) => {
            assert_eq!(volume.volume_id, "pv-mem");
            assert_eq!(volume.capacity_bytes, GIB);
        }
        other => panic!("expected volume, got {:?}", other),
    }

    let missing_caps = br#"{"method":"CreateVolume","params":{"name":"pv-mem"}}"#;
    let reply = h.router.handle_envelope(missing_caps).await;
    assert_eq!(error_code(&reply), Some(RpcCode::InvalidArgument));
}
