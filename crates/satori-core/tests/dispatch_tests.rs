//! Integration tests for the correlation & dispatch engine.
//!
//! Every test drives a real `SatoriClient` against an in-process
//! `EnginePeer` that plays the engine's side of the wire.

#![allow(clippy::unwrap_used, clippy::panic)]

use satori_core::transport::{MessageSink, MessageStream};
use satori_core::{
    Command, Connector, Credentials, EnginePeer, MemoryConnector, Response, SatoriClient,
    SatoriError,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a client connected to a fresh in-process engine.
async fn connected() -> (SatoriClient, EnginePeer) {
    let (connector, peer) = MemoryConnector::pair();
    let client = SatoriClient::new("mem://engine", Credentials::new("alice", "secret"));
    client.connect_with(&connector).await.unwrap();
    (client, peer)
}

/// Issue a call on a background task.
fn spawn_call(
    client: &SatoriClient,
    command: Command,
    fields: Value,
) -> JoinHandle<Result<Response, SatoriError>> {
    let client = client.clone();
    tokio::spawn(async move { client.call(command, fields).await })
}

/// Receive the next request and reply to it with `{"id": .., "ok": true}`.
async fn ack_next(peer: &mut EnginePeer) -> Value {
    let request = peer.recv_json().await.unwrap();
    assert!(peer.send_json(&json!({"id": request["id"], "ok": true})));
    request
}

/// Subscribe `key`, answering the NOTIFY, and collect data into a channel.
async fn subscribe_collecting(
    client: &SatoriClient,
    peer: &mut EnginePeer,
    key: &str,
) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscribing = {
        let client = client.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            client
                .subscribe(key, move |data| {
                    let _ = tx.send(data);
                })
                .await
        })
    };
    let request = ack_next(peer).await;
    assert_eq!(request["command"], "NOTIFY");
    assert_eq!(request["key"], key);
    subscribing.await.unwrap().unwrap();
    rx
}

/// A connection whose writes never complete and which never receives.
struct StalledConnector;

struct StalledSink;

struct SilentStream;

impl MessageSink for StalledSink {
    async fn send(&mut self, _text: String) -> satori_core::Result<()> {
        std::future::pending().await
    }

    async fn close(&mut self) {}
}

impl MessageStream for SilentStream {
    async fn recv(&mut self) -> Option<satori_core::Result<String>> {
        std::future::pending().await
    }
}

impl Connector for StalledConnector {
    type Sink = StalledSink;
    type Stream = SilentStream;

    async fn connect(&self, _endpoint: &str) -> satori_core::Result<(StalledSink, SilentStream)> {
        Ok((StalledSink, SilentStream))
    }
}

fn failing_callback(_: Value) {
    panic!("subscriber bug");
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test step took too long")
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

#[tokio::test]
async fn round_trip_returns_matching_response() {
    let (client, mut peer) = connected().await;

    let call = spawn_call(&client, Command::Get, json!({"key": "a"}));
    let request = peer.recv_json().await.unwrap();

    assert_eq!(request["command"], "GET");
    assert_eq!(request["key"], "a");
    assert_eq!(request["username"], "alice");
    assert_eq!(request["password"], "secret");
    let id = request["id"].clone();
    assert!(id.is_string());

    assert!(peer.send_json(&json!({"id": id, "value": "v"})));

    let response = within(call).await.unwrap().unwrap();
    assert_eq!(response.into_value(), json!({"id": id, "value": "v"}));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn reserved_fields_cannot_be_overridden() {
    let (client, mut peer) = connected().await;

    let call = spawn_call(
        &client,
        Command::Get,
        json!({"id": "forged", "username": "mallory", "command": "DELETE", "key": "a"}),
    );
    let request = ack_next(&mut peer).await;

    assert_ne!(request["id"], "forged");
    assert_eq!(request["username"], "alice");
    assert_eq!(request["command"], "GET");
    assert_eq!(request["key"], "a");
    within(call).await.unwrap().unwrap();
}

#[tokio::test]
async fn responses_in_reverse_order_reach_their_own_callers() {
    let (client, mut peer) = connected().await;

    let first = spawn_call(&client, Command::Get, json!({"key": "first"}));
    let second = spawn_call(&client, Command::Get, json!({"key": "second"}));

    let a = peer.recv_json().await.unwrap();
    let b = peer.recv_json().await.unwrap();
    assert_eq!(client.pending_calls(), 2);

    // Reply last-received first, echoing each request's key.
    for request in [&b, &a] {
        assert!(peer.send_json(&json!({"id": request["id"], "echo": request["key"]})));
    }

    let first = within(first).await.unwrap().unwrap();
    let second = within(second).await.unwrap().unwrap();
    assert_eq!(first.get("echo"), Some(&json!("first")));
    assert_eq!(second.get("echo"), Some(&json!("second")));
}

#[tokio::test]
async fn many_concurrent_calls_are_matched_by_id() {
    let (client, mut peer) = connected().await;

    let calls: Vec<_> = (0..32)
        .map(|n| spawn_call(&client, Command::Get, json!({"key": n})))
        .collect();

    let mut requests = Vec::new();
    for _ in 0..32 {
        requests.push(peer.recv_json().await.unwrap());
    }
    for request in requests.iter().rev() {
        assert!(peer.send_json(&json!({"id": request["id"], "echo": request["key"]})));
    }

    for (n, call) in calls.into_iter().enumerate() {
        let response = within(call).await.unwrap().unwrap();
        assert_eq!(response.get("echo"), Some(&json!(n)));
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn unmatched_and_malformed_frames_are_ignored() {
    let (client, mut peer) = connected().await;

    let call = spawn_call(&client, Command::Get, json!({"key": "a"}));
    let request = peer.recv_json().await.unwrap();

    assert!(peer.send_json(&json!({"id": "nobody-asked", "value": 1})));
    assert!(peer.send_text("{not json"));
    assert!(peer.send_json(&json!({"no_id": true})));
    assert!(peer.send_json(&json!({"id": request["id"], "value": 2})));

    let response = within(call).await.unwrap().unwrap();
    assert_eq!(response.get("value"), Some(&json!(2)));
    assert!(client.is_connected());
}

#[tokio::test]
async fn facade_methods_send_their_command_tag() {
    let (client, mut peer) = connected().await;

    let c = client.clone();
    let call = tokio::spawn(async move { c.graph_shortest_path(json!({"from": "a", "to": "b"})).await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "GRAPH_SHORTEST_PATH");
    assert_eq!(request["from"], "a");
    within(call).await.unwrap().unwrap();

    let c = client.clone();
    let call = tokio::spawn(async move { c.get_operations().await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "GET_OPERATIONS");
    assert_eq!(request.as_object().unwrap().len(), 4);
    within(call).await.unwrap().unwrap();

    let c = client.clone();
    let call = tokio::spawn(async move { c.create_mindspace(json!({"mindspace_id": "m"})).await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "SET_MINDSPACE");
    within(call).await.unwrap().unwrap();
}

#[tokio::test]
async fn schema_builder_replays_its_fields() {
    let (client, mut peer) = connected().await;
    let user = client
        .schema("users")
        .with_key("alice")
        .with_body(json!({"age": 30}));

    let u = user.clone();
    let call = tokio::spawn(async move { u.set().await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "SET");
    assert_eq!(request["schema"], "users");
    assert_eq!(request["key"], "alice");
    assert_eq!(request["data"], json!({"age": 30}));
    within(call).await.unwrap().unwrap();

    let u = user.clone();
    let call = tokio::spawn(async move { u.get_refs().await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "GET_REFS");
    assert!(request.get("data").is_none());
    within(call).await.unwrap().unwrap();
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[tokio::test]
async fn notification_invokes_callback_once_and_resolves_nothing() {
    let (client, mut peer) = connected().await;
    let mut updates = subscribe_collecting(&client, &mut peer, "users:alice").await;
    assert!(client.is_subscribed("users:alice"));

    let pending = spawn_call(&client, Command::Get, json!({"key": "users:alice"}));
    let request = peer.recv_json().await.unwrap();

    assert!(peer.send_json(&json!({
        "type": "notification",
        "key": "users:alice",
        "data": {"age": 31},
    })));

    assert_eq!(within(updates.recv()).await, Some(json!({"age": 31})));
    assert_eq!(client.pending_calls(), 1);

    assert!(peer.send_json(&json!({"id": request["id"], "value": "v"})));
    within(pending).await.unwrap().unwrap();
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn notification_right_after_subscribe_is_not_missed() {
    let (client, mut peer) = connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let c = client.clone();
    let subscribing = tokio::spawn(async move {
        c.subscribe("k", move |data| {
            let _ = tx.send(data);
        })
        .await
    });

    // The engine pushes before it acknowledges NOTIFY.
    let request = peer.recv_json().await.unwrap();
    assert!(peer.send_json(&json!({"type": "notification", "key": "k", "data": 1})));
    assert!(peer.send_json(&json!({"id": request["id"], "ok": true})));

    within(subscribing).await.unwrap().unwrap();
    assert_eq!(within(rx.recv()).await, Some(json!(1)));
}

#[tokio::test]
async fn notifications_keep_wire_order() {
    let (client, mut peer) = connected().await;
    let mut updates = subscribe_collecting(&client, &mut peer, "counter").await;

    for n in 0..10 {
        assert!(peer.send_json(&json!({"type": "notification", "key": "counter", "data": n})));
    }

    for n in 0..10 {
        assert_eq!(within(updates.recv()).await, Some(json!(n)));
    }
}

#[tokio::test]
async fn unknown_topic_is_dropped_silently() {
    let (client, mut peer) = connected().await;
    let mut known = subscribe_collecting(&client, &mut peer, "known").await;

    assert!(peer.send_json(&json!({"type": "notification", "key": "unknown", "data": 0})));
    assert!(peer.send_json(&json!({"type": "notification", "key": "known", "data": 1})));

    assert_eq!(within(known.recv()).await, Some(json!(1)));
    assert!(client.is_connected());
}

#[tokio::test]
async fn late_notification_after_unsubscribe_invokes_nothing() {
    let (client, mut peer) = connected().await;
    let mut gone = subscribe_collecting(&client, &mut peer, "gone").await;
    let mut barrier = subscribe_collecting(&client, &mut peer, "barrier").await;

    let c = client.clone();
    let unsubscribing = tokio::spawn(async move { c.unsubscribe("gone").await });
    let request = ack_next(&mut peer).await;
    assert_eq!(request["command"], "UNNOTIFY");
    assert_eq!(request["key"], "gone");
    within(unsubscribing).await.unwrap().unwrap();
    assert!(!client.is_subscribed("gone"));

    assert!(peer.send_json(&json!({"type": "notification", "key": "gone", "data": 1})));
    assert!(peer.send_json(&json!({"type": "notification", "key": "barrier", "data": 2})));

    // Notifications are delivered in order, so once the barrier arrives the
    // late one has already been discarded.
    assert_eq!(within(barrier.recv()).await, Some(json!(2)));
    assert!(gone.try_recv().is_err());
}

#[tokio::test]
async fn resubscribing_replaces_the_callback() {
    let (client, mut peer) = connected().await;
    let mut old = subscribe_collecting(&client, &mut peer, "k").await;
    let mut new = subscribe_collecting(&client, &mut peer, "k").await;

    assert!(peer.send_json(&json!({"type": "notification", "key": "k", "data": "x"})));

    assert_eq!(within(new.recv()).await, Some(json!("x")));
    assert!(old.try_recv().is_err());
}

#[tokio::test]
async fn failed_subscribe_is_rolled_back() {
    let client = SatoriClient::new("mem://engine", Credentials::default());

    let err = client.subscribe("k", |_| {}).await.unwrap_err();

    assert_eq!(err, SatoriError::NotConnected);
    assert!(!client.is_subscribed("k"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_callback_does_not_block_responses() {
    let (client, mut peer) = connected().await;
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = Arc::new(Mutex::new(release_rx));
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();

    let c = client.clone();
    let subscribing = tokio::spawn(async move {
        c.subscribe("slow", move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().unwrap().recv();
        })
        .await
    });
    ack_next(&mut peer).await;
    within(subscribing).await.unwrap().unwrap();

    assert!(peer.send_json(&json!({"type": "notification", "key": "slow", "data": null})));
    within(entered_rx.recv()).await.unwrap();

    // The callback is now parked; a call must still complete.
    let call = spawn_call(&client, Command::Get, json!({"key": "a"}));
    ack_next(&mut peer).await;
    within(call).await.unwrap().unwrap();

    release_tx.send(()).unwrap();
}

#[tokio::test]
async fn panicking_callback_does_not_stop_other_topics() {
    let (client, mut peer) = connected().await;

    let c = client.clone();
    let subscribing = tokio::spawn(async move { c.subscribe("bad", failing_callback).await });
    ack_next(&mut peer).await;
    within(subscribing).await.unwrap().unwrap();
    let mut good = subscribe_collecting(&client, &mut peer, "good").await;

    for (key, data) in [("bad", 1), ("good", 2), ("bad", 3), ("good", 4)] {
        assert!(peer.send_json(&json!({"type": "notification", "key": key, "data": data})));
    }

    assert_eq!(within(good.recv()).await, Some(json!(2)));
    assert_eq!(within(good.recv()).await, Some(json!(4)));
    assert!(client.is_connected());
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn transport_close_mid_wait_fails_the_call() {
    let (client, mut peer) = connected().await;

    let call = spawn_call(&client, Command::Get, json!({"key": "a"}));
    peer.recv_json().await.unwrap();
    assert_eq!(client.pending_calls(), 1);

    peer.hang_up();

    let err = within(call).await.unwrap().unwrap_err();
    assert!(matches!(err, SatoriError::Transport(_)));
    assert_eq!(client.pending_calls(), 0);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn read_failure_fails_every_pending_call() {
    let (client, mut peer) = connected().await;

    let a = spawn_call(&client, Command::Get, json!({"key": "a"}));
    let b = spawn_call(&client, Command::Get, json!({"key": "b"}));
    peer.recv_json().await.unwrap();
    peer.recv_json().await.unwrap();

    assert!(peer.fail("socket reset"));

    for call in [a, b] {
        let err = within(call).await.unwrap().unwrap_err();
        assert_eq!(err, SatoriError::Transport("socket reset".into()));
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn calls_after_connection_loss_fail_fast() {
    let (client, mut peer) = connected().await;
    peer.hang_up();

    // Wait for the dispatcher to notice.
    within(async {
        while client.is_connected() {
            tokio::task::yield_now().await;
        }
    })
    .await;

    let err = client.call(Command::Get, json!({"key": "a"})).await.unwrap_err();
    assert!(matches!(err, SatoriError::Transport(_)));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn write_failure_surfaces_as_transport_error() {
    let (client, peer) = connected().await;
    drop(peer);

    let err = within(client.call(Command::Get, json!({"key": "a"})))
        .await
        .unwrap_err();

    assert!(matches!(err, SatoriError::Transport(_)));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_removes_entry_and_keeps_connection() {
    let (client, mut peer) = connected().await;

    let err = client
        .call_with_timeout(Command::Get, json!({"key": "slow"}), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err, SatoriError::Timeout(Duration::from_millis(50)));
    assert_eq!(client.pending_calls(), 0);

    // The engine answers too late; the reply is discarded.
    let stale = peer.recv_json().await.unwrap();
    assert!(peer.send_json(&json!({"id": stale["id"], "value": "late"})));

    let call = spawn_call(&client, Command::Get, json!({"key": "fast"}));
    let request = peer.recv_json().await.unwrap();
    assert_ne!(request["id"], stale["id"]);
    assert!(peer.send_json(&json!({"id": request["id"], "value": "on time"})));

    let response = within(call).await.unwrap().unwrap();
    assert_eq!(response.get("value"), Some(&json!("on time")));
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn default_timeout_applies_to_every_call() {
    let (connector, _peer) = MemoryConnector::pair();
    let client = SatoriClient::new("mem://engine", Credentials::default())
        .with_request_timeout(Duration::from_millis(30));
    client.connect_with(&connector).await.unwrap();

    let err = client.get(json!({"key": "a"})).await.unwrap_err();

    assert_eq!(err, SatoriError::Timeout(Duration::from_millis(30)));
}

#[tokio::test(start_paused = true)]
async fn stalled_write_is_bounded_by_the_deadline() {
    let client = SatoriClient::new("stalled://engine", Credentials::default());
    client.connect_with(&StalledConnector).await.unwrap();

    let err = within(client.call_with_timeout(
        Command::Get,
        json!({"key": "a"}),
        Duration::from_millis(100),
    ))
    .await
    .unwrap_err();

    assert_eq!(err, SatoriError::Timeout(Duration::from_millis(100)));
    assert_eq!(client.pending_calls(), 0);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn stalled_write_honours_default_timeout() {
    let client = SatoriClient::new("stalled://engine", Credentials::default())
        .with_request_timeout(Duration::from_millis(40));
    client.connect_with(&StalledConnector).await.unwrap();

    let err = within(client.set(json!({"key": "a", "data": 1})))
        .await
        .unwrap_err();

    assert_eq!(err, SatoriError::Timeout(Duration::from_millis(40)));
}

#[tokio::test]
async fn dropped_call_leaves_no_pending_entry() {
    let (client, mut peer) = connected().await;

    let call = spawn_call(&client, Command::Get, json!({"key": "a"}));
    peer.recv_json().await.unwrap();
    assert_eq!(client.pending_calls(), 1);

    call.abort();
    let _ = call.await;

    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn connect_failure_is_a_connection_error() {
    let (connector, _peer) = MemoryConnector::pair();
    let first = SatoriClient::new("mem://engine", Credentials::default());
    first.connect_with(&connector).await.unwrap();

    let second = SatoriClient::new("mem://engine", Credentials::default());
    let err = second.connect_with(&connector).await.unwrap_err();

    assert!(matches!(err, SatoriError::Connection(_)));
    assert!(!second.is_connected());
}

#[tokio::test]
async fn reconnect_replaces_the_connection() {
    let (client, mut old_peer) = connected().await;
    let stranded = spawn_call(&client, Command::Get, json!({"key": "a"}));
    old_peer.recv_json().await.unwrap();

    let (connector, mut new_peer) = MemoryConnector::pair();
    client.connect_with(&connector).await.unwrap();

    let err = within(stranded).await.unwrap().unwrap_err();
    assert_eq!(err, SatoriError::Transport("connection replaced".into()));

    let call = spawn_call(&client, Command::Get, json!({"key": "b"}));
    let request = ack_next(&mut new_peer).await;
    assert_eq!(request["key"], "b");
    within(call).await.unwrap().unwrap();
}

#[tokio::test]
async fn clients_do_not_share_state() {
    let (alice, mut alice_peer) = connected().await;
    let (bob, _bob_peer) = connected().await;

    let _updates = subscribe_collecting(&alice, &mut alice_peer, "k").await;

    assert!(alice.is_subscribed("k"));
    assert!(!bob.is_subscribed("k"));
}
