//! End-to-end pipeline tests through the public API

use std::sync::Arc;
use std::time::Duration;

use relais::plugins::register_builtin;
use relais::{
    ErrorKind, FrameStore, MemoryStore, OpContext, PluginConfig, PluginError, PluginManager,
    PluginRegistry, PluginRole, Relay, RelayConfig,
};
use tokio::sync::mpsc;

const MARKER: u8 = 0xA5;

fn manager() -> (PluginManager, Arc<dyn FrameStore>, mpsc::Receiver<relais::Frame>) {
    let store: Arc<dyn FrameStore> = Arc::new(MemoryStore::new());
    let registry = Arc::new(PluginRegistry::new());
    let (tx, rx) = mpsc::channel(64);
    register_builtin(&registry, tx).unwrap();
    (PluginManager::new(registry, Arc::clone(&store)), store, rx)
}

#[tokio::test]
async fn test_ingress_transform_round_trip() {
    let (manager, store, _rx) = manager();
    let ctx = OpContext::background();

    manager
        .start_plugin(
            PluginRole::Ingress,
            "synthetic",
            PluginConfig::new()
                .set("session_id", "s")
                .set("fps", 1000)
                .set("frame_count", 10),
        )
        .await
        .unwrap();

    // Ingress runs to completion before the transform starts
    for _ in 0..400 {
        if !manager.get_plugin_status("synthetic").unwrap().running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let status = manager.get_plugin_status("synthetic").unwrap();
    assert!(!status.running);
    assert!(status.last_error.is_none());

    manager
        .start_plugin(
            PluginRole::Transform,
            "marker",
            PluginConfig::new()
                .set("marker", MARKER)
                .set("session_id", "s")
                .set("poll_interval_ms", 10),
        )
        .await
        .unwrap();

    let mut frames = Vec::new();
    for _ in 0..400 {
        frames = store.list_frames(&ctx, "s").await.unwrap();
        if frames.iter().all(|f| f.data.last() == Some(&MARKER)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(frames.len(), 10);
    let indices: Vec<i64> = frames.iter().map(|f| f.index).collect();
    assert_eq!(indices, (0..10).collect::<Vec<i64>>());
    for frame in &frames {
        assert_eq!(&frame.data[..], b"mock frame data\xA5");
    }

    manager.stop_plugin("marker").unwrap();
    manager.shutdown().await;
}

#[tokio::test]
async fn test_egress_sees_every_index_once() {
    let (manager, _store, mut rx) = manager();

    manager
        .start_plugin(
            PluginRole::Egress,
            "channel",
            PluginConfig::new()
                .set("session_id", "live")
                .set("poll_interval_ms", 10),
        )
        .await
        .unwrap();
    manager
        .start_plugin(
            PluginRole::Ingress,
            "synthetic",
            PluginConfig::new()
                .set("session_id", "live")
                .set("fps", 500)
                .set("frame_count", 25),
        )
        .await
        .unwrap();

    let mut indices = Vec::new();
    while indices.len() < 25 {
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("egress stalled")
            .expect("sink closed");
        indices.push(frame.index);
    }
    assert_eq!(indices, (0..25).collect::<Vec<i64>>());

    manager.shutdown().await;
}

#[test]
fn test_registry_contract() {
    let registry = PluginRegistry::new();
    let (tx, _rx) = mpsc::channel(1);
    register_builtin(&registry, tx).unwrap();

    let err = registry
        .register(PluginRole::Ingress, "synthetic", || {
            Box::new(relais::plugins::SyntheticIngress::new())
        })
        .unwrap_err();
    assert!(matches!(err, PluginError::AlreadyRegistered { .. }));

    let err = registry.create(PluginRole::Egress, "nonexistent").err().unwrap();
    assert!(matches!(err, PluginError::NotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Plugin);
}

#[tokio::test]
async fn test_relay_delete_session_resets_consumers() {
    let relay = Relay::start(RelayConfig::default()).await.unwrap();
    let mut egress = relay.take_egress().unwrap();
    let ctx = OpContext::background();

    relay
        .start_plugin(
            PluginRole::Egress,
            "channel",
            PluginConfig::new()
                .set("session_id", "s")
                .set("poll_interval_ms", 10),
        )
        .await
        .unwrap();

    let store = relay.store();
    store
        .put_frame(&ctx, relais::Frame::video("s", 0, "first"))
        .await
        .unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(5), egress.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&frame.data[..], b"first");

    // A recreated session is read again from its first frame
    store.delete_session(&ctx, "s").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    store
        .put_frame(&ctx, relais::Frame::video("s", 0, "second"))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), egress.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&frame.data[..], b"second");

    relay.shutdown().await.unwrap();
}
