#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use bitboard_bridge::app_state::AppState;
use bitboard_bridge::config::{BridgeConfig, FixedPosition};
use bitboard_bridge::facade::{
    FixedProvider, Haptics, LocationProvider, LoopbackTransport, Mesh, Submission,
    TransportEvent, TracingHaptics,
};
use bitboard_bridge::{BridgeClient, ChannelSink};
use bitboard_core::error::Result;
use bitboard_core::model::{now_millis, Authorization, BluetoothState, MeshPeer, Position};
use bitboard_core::protocol::{Callback, HapticStyle, Outbound};

struct Harness {
    state: AppState,
    mesh: Arc<Mesh<LoopbackTransport>>,
    client: BridgeClient,
}

fn fixed() -> Arc<FixedProvider> {
    Arc::new(FixedProvider::new(Some(FixedPosition {
        latitude: 37.7749,
        longitude: -122.4194,
        accuracy: 5.0,
        altitude: None,
    })))
}

fn harness_with(
    cfg: BridgeConfig,
    transport: LoopbackTransport,
    provider: Arc<dyn LocationProvider>,
) -> Harness {
    let mesh = Arc::new(Mesh::new(transport, &cfg.mesh));
    let queue = cfg.bridge.outbound_queue;
    let state = AppState::with_parts(cfg, provider, mesh.clone(), Arc::new(TracingHaptics)).unwrap();
    let (sink, rx) = ChannelSink::channel(queue);
    let router = state.new_router(Arc::new(sink));
    let client = BridgeClient::attach(router, rx);
    Harness { state, mesh, client }
}

fn harness() -> Harness {
    harness_with(BridgeConfig::default(), LoopbackTransport::new(), fixed())
}

async fn next_named(rx: &mut broadcast::Receiver<Callback>, name: &str) -> Callback {
    loop {
        let cb = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("callback in time")
            .expect("callback stream open");
        if cb.name == name {
            return cb;
        }
    }
}

#[tokio::test]
async fn recognised_actions_answer_once_without_error() {
    let h = harness();
    for (action, payload) in [
        ("mesh.getStatus", json!({})),
        ("mesh.getPeers", json!({})),
        ("mesh.broadcast", json!({ "content": "hello" })),
        ("location.getCurrentPosition", json!({})),
        ("location.getCurrentGeohash", json!({ "precision": 6 })),
        ("app.hapticFeedback", json!({ "style": "heavy" })),
    ] {
        let resp = h.client.call(action, payload).await.unwrap();
        assert!(resp.is_ok(), "{action}: {:?}", resp.error);
    }
    assert_eq!(h.client.pending(), 0);
    assert_eq!(h.client.router().in_flight(), 0);

    let resp = h
        .client
        .call("location.getCurrentGeohash", json!({ "precision": 6 }))
        .await
        .unwrap();
    assert_eq!(resp.result, json!("9q8yyk"));
}

#[tokio::test]
async fn unknown_action_mentions_the_action() {
    let h = harness();
    let resp = h.client.call("camera.takePhoto", json!({})).await.unwrap();
    assert_eq!(resp.result, Value::Null);
    assert_eq!(resp.error.as_deref(), Some("Unknown action: camera.takePhoto"));
}

#[tokio::test]
async fn missing_keys_are_named() {
    let h = harness();
    for (action, payload, key) in [
        ("mesh.broadcast", json!({}), "content"),
        ("mesh.sendDirect", json!({ "message": { "content": "x" } }), "peerId"),
        ("mesh.sendDirect", json!({ "peerId": "p1" }), "message.content"),
        ("mesh.sendDirect", json!({ "peerId": "p1", "message": {} }), "message.content"),
    ] {
        let resp = h.client.call(action, payload).await.unwrap();
        assert_eq!(resp.result, Value::Null);
        assert_eq!(
            resp.error.as_deref(),
            Some(format!("Invalid payload: missing {key}").as_str())
        );
    }
    assert!(h.mesh.transport().submissions().is_empty());
}

#[tokio::test]
async fn slow_broadcast_does_not_block_status() {
    let h = harness_with(
        BridgeConfig::default(),
        LoopbackTransport::new().with_delay(Duration::from_millis(500)),
        fixed(),
    );

    let slow = tokio::spawn({
        let client = h.client.clone();
        async move { client.call("mesh.broadcast", json!({ "content": "slow" })).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let status = h.client.call("mesh.getStatus", json!({})).await.unwrap();
    assert!(status.is_ok());
    assert_eq!(status.result["peerCount"], 0);
    assert!(!slow.is_finished(), "status must settle while the broadcast is pending");

    let slow = slow.await.unwrap().unwrap();
    assert!(slow.is_ok());
    assert_ne!(slow.id, status.id);
}

struct SlowProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LocationProvider for SlowProvider {
    fn authorization(&self) -> Authorization {
        Authorization::Authorized
    }

    fn request_authorization(&self) {}

    async fn request_location(&self) -> Result<Position> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Position {
            latitude: 57.64911,
            longitude: 10.40744,
            accuracy: 8.0,
            altitude: None,
            timestamp: 1,
        })
    }
}

#[tokio::test]
async fn concurrent_location_requests_share_one_fix() {
    let provider = Arc::new(SlowProvider {
        calls: AtomicUsize::new(0),
    });
    let h = harness_with(BridgeConfig::default(), LoopbackTransport::new(), provider.clone());

    let a = h.client.call("location.getCurrentPosition", json!({}));
    let b = h.client.call("location.getCurrentGeohash", json!({ "precision": 11 }));
    let (a, b) = tokio::join!(a, b);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.result["latitude"], 57.64911);
    assert_eq!(b.result, json!("u4pruydqqvj"));
}

#[tokio::test]
async fn direct_to_unknown_peer_fails_without_submitting() {
    let h = harness();
    let resp = h
        .client
        .call("mesh.sendDirect", json!({ "peerId": "ghost", "message": { "content": "psst" } }))
        .await
        .unwrap();
    assert_eq!(resp.error.as_deref(), Some("Peer not found: ghost"));
    assert!(h.mesh.transport().submissions().is_empty());

    h.mesh.apply(TransportEvent::PeerSeen(MeshPeer::new("ghost", now_millis())));
    let resp = h
        .client
        .call("mesh.sendDirect", json!({ "peerId": "ghost", "message": { "content": "psst" } }))
        .await
        .unwrap();
    assert!(resp.is_ok());
    let subs = h.mesh.transport().submissions();
    let [Submission::Direct { peer_id, message }] = subs.as_slice() else {
        panic!("expected one direct submission, got {subs:?}");
    };
    assert_eq!(peer_id, "ghost");
    assert_eq!(message.content, "psst");
}

#[tokio::test]
async fn malformed_envelopes_are_dropped_silently() {
    let h = harness();
    let (sink, mut rx) = ChannelSink::channel(8);
    let router = h.state.new_router(Arc::new(sink));

    for raw in [
        "not json",
        "[1,2]",
        r#"{"action":"mesh.getStatus"}"#,
        r#"{"id":1,"action":"mesh.getStatus"}"#,
        r#"{"id":"1","action":7}"#,
    ] {
        assert!(router.handle_envelope(raw).is_none(), "{raw}");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(
        h.state
            .metrics()
            .dropped_envelopes
            .get(&[("reason", "malformed")]),
        5
    );
    assert!(h
        .state
        .metrics()
        .render()
        .contains("bitboard_dropped_envelopes_total{reason=\"malformed\"} 5"));
}

#[tokio::test]
async fn duplicate_in_flight_id_is_dropped() {
    let h = harness_with(
        BridgeConfig::default(),
        LoopbackTransport::new().with_delay(Duration::from_millis(200)),
        fixed(),
    );
    let (sink, mut rx) = ChannelSink::channel(8);
    let router = h.state.new_router(Arc::new(sink));

    let first = router
        .handle_envelope(r#"{"id":"dup","action":"mesh.broadcast","payload":{"content":"a"}}"#)
        .unwrap();
    assert!(router
        .handle_envelope(r#"{"id":"dup","action":"mesh.getStatus"}"#)
        .is_none());
    assert_eq!(router.in_flight(), 1);

    first.await.unwrap();
    let Some(Outbound::Response(resp)) = rx.recv().await else {
        panic!("expected the original response");
    };
    assert_eq!(resp.id, "dup");
    assert_eq!(resp.result, Value::Null);
    assert!(resp.is_ok());
    assert!(rx.try_recv().is_err());
    assert_eq!(
        h.state
            .metrics()
            .dropped_envelopes
            .get(&[("reason", "duplicate_id")]),
        1
    );

    // the id is free again once settled
    router
        .handle_envelope(r#"{"id":"dup","action":"mesh.getStatus"}"#)
        .unwrap()
        .await
        .unwrap();
}

#[tokio::test]
async fn request_timeout_answers_with_timeout() {
    let mut cfg = BridgeConfig::default();
    cfg.bridge.request_timeout_ms = 100;
    let h = harness_with(
        cfg,
        LoopbackTransport::new().with_delay(Duration::from_secs(5)),
        fixed(),
    );

    let resp = h
        .client
        .call("mesh.broadcast", json!({ "content": "stuck" }))
        .await
        .unwrap();
    assert_eq!(resp.error.as_deref(), Some("Timed out after 100 ms"));
    assert_eq!(h.client.router().in_flight(), 0);
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let h = harness();
    let mut callbacks = h.client.subscribe_callbacks();

    h.mesh.apply(TransportEvent::RadioChanged {
        bluetooth_state: BluetoothState::PoweredOn,
        scanning: true,
        advertising: true,
    });
    for (i, id) in ["a", "b", "c"].into_iter().enumerate() {
        h.mesh.apply(TransportEvent::PeerSeen(MeshPeer::new(id, now_millis() + i as u64)));
    }
    h.mesh.apply(TransportEvent::PeerLost("b".into()));

    let mut seen = Vec::new();
    for _ in 0..4 {
        let cb = next_named(&mut callbacks, "mesh.peerChange").await;
        let ids: Vec<String> = cb.args[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect();
        seen.push(ids.join(","));
    }
    assert_eq!(seen, vec!["a", "a,b", "a,b,c", "a,c"]);

    let mut counts = Vec::new();
    for _ in 0..5 {
        let cb = next_named(&mut callbacks, "mesh.statusChange").await;
        counts.push(cb.args[0]["peerCount"].as_u64().unwrap());
    }
    assert_eq!(counts, vec![0, 1, 2, 3, 2]);
}

#[tokio::test]
async fn echoed_broadcast_comes_back_as_local_message() {
    let mut cfg = BridgeConfig::default();
    cfg.mesh.echo_broadcasts = true;
    let h = harness_with(cfg, LoopbackTransport::new(), fixed());
    let mut callbacks = h.client.subscribe_callbacks();

    let resp = h
        .client
        .call(
            "mesh.broadcast",
            json!({ "content": "gm mesh", "boardId": "b/rust", "tags": ["hello"] }),
        )
        .await
        .unwrap();
    assert!(resp.is_ok());

    let cb = next_named(&mut callbacks, "mesh.message").await;
    let msg = &cb.args[0];
    assert_eq!(msg["sender"], "local");
    assert_eq!(msg["type"], "public");
    assert_eq!(msg["content"], "gm mesh");
    assert_eq!(msg["boardId"], "b/rust");
    assert_eq!(msg["tags"], json!(["hello"]));
    assert!(msg.get("parentId").is_none());
}

#[derive(Default)]
struct CountingHaptics(AtomicUsize);

impl Haptics for CountingHaptics {
    fn impact(&self, _style: HapticStyle) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn disabled_haptics_succeed_without_impact() {
    for enabled in [false, true] {
        let mut cfg = BridgeConfig::default();
        cfg.haptics.enabled = enabled;
        let haptics = Arc::new(CountingHaptics::default());
        let mesh = Arc::new(Mesh::new(LoopbackTransport::new(), &cfg.mesh));
        let state = AppState::with_parts(cfg, fixed(), mesh, haptics.clone()).unwrap();
        let (sink, rx) = ChannelSink::channel(8);
        let client = BridgeClient::attach(state.new_router(Arc::new(sink)), rx);

        let resp = client
            .call("app.hapticFeedback", json!({ "style": "light" }))
            .await
            .unwrap();
        assert_eq!(resp.result, Value::Null, "enabled={enabled}");
        assert_eq!(resp.error, None, "enabled={enabled}");
        assert_eq!(haptics.0.load(Ordering::SeqCst), usize::from(enabled));
    }
}

#[test]
fn zero_event_buffer_is_a_config_error() {
    let mut cfg = BridgeConfig::default();
    cfg.mesh.event_buffer = 0;
    let Err(err) = AppState::new(cfg) else {
        panic!("zero event buffer must be rejected");
    };
    assert_eq!(err.client_code().as_str(), "CONFIG");
    assert!(err.to_string().contains("event_buffer"), "{err}");
}

#[tokio::test]
async fn shutdown_unsubscribes_events() {
    let h = harness();
    let mut callbacks = h.client.subscribe_callbacks();
    h.client.router().shutdown();

    let seen = now_millis();
    h.mesh.apply(TransportEvent::PeerSeen(MeshPeer::new("late", seen)));
    let got = tokio::time::timeout(Duration::from_millis(100), callbacks.recv()).await;
    assert!(got.is_err(), "no callbacks after shutdown");

    let resp = h.client.call("mesh.getPeers", json!({})).await.unwrap();
    assert_eq!(resp.result, json!([{ "id": "late", "lastSeen": seen }]));
}
