//! End-to-end tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use peerlink_signal_relay::{http, Config, SignalingRelay};
use signal_types::ClientId;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a relay on an ephemeral port. Dropping the sender stops it.
async fn boot_relay(config: Config) -> (String, Arc<SignalingRelay>, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let relay = Arc::new(SignalingRelay::new(config));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(http::serve(listener, relay.clone(), async move {
        let _ = shutdown_rx.await;
    }));

    (format!("ws://{addr}"), relay, shutdown_tx)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame, skipping control frames.
async fn recv_text(ws: &mut WsStream) -> String {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

/// Assert nothing arrives for a short while.
async fn assert_silent(ws: &mut WsStream) {
    let result = timeout(QUIET, ws.next()).await;
    assert!(result.is_err(), "unexpected message: {result:?}");
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let waited = timeout(TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn rendezvous_scenario() {
    let (url, relay, _shutdown) = boot_relay(Config::default()).await;
    let a_id = ClientId::from("A");
    let b_id = ClientId::from("B");

    // A asks first: nobody to match, A waits
    let mut a = connect(&url).await;
    send(&mut a, json!({"id": "A", "type": "signaling_request"})).await;
    eventually("A pending", || relay.is_pending(&a_id)).await;
    assert_silent(&mut a).await;

    // B asks: matched with A, only B hears about it
    let mut b = connect(&url).await;
    send(&mut b, json!({"id": "B", "type": "signaling_request"})).await;
    let response: Value = serde_json::from_str(&recv_text(&mut b).await).unwrap();
    assert_eq!(
        response,
        json!({"type": "signaling_response", "target_id": "A", "request": "offer"})
    );
    assert_eq!(relay.pending_snapshot(), vec![a_id.clone(), b_id.clone()]);
    assert_silent(&mut a).await;

    // A's offer reaches B byte for byte
    let offer = r#"{"id":"A","type":"offer","target_id":"B","sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1"}"#;
    a.send(Message::Text(offer.to_string())).await.unwrap();
    assert_eq!(recv_text(&mut b).await, offer);

    // B answers
    let answer = r#"{"type":"answer","target_id":"A","sdp":"v=0"}"#;
    b.send(Message::Text(answer.to_string())).await.unwrap();
    assert_eq!(recv_text(&mut a).await, answer);

    // B leaves: gone from registry and pending set
    b.close(None).await.unwrap();
    drop(b);
    eventually("B cleaned up", || {
        !relay.is_registered(&b_id) && !relay.is_pending(&b_id)
    })
    .await;
    assert!(relay.is_pending(&a_id));

    // Forwards to B are now dropped without any reply
    send(&mut a, json!({"type": "candidate", "target_id": "B", "candidate": "x"})).await;
    assert_silent(&mut a).await;
    assert_eq!(relay.registered_count(), 1);
}

#[tokio::test]
async fn malformed_input_keeps_connection_open() {
    let (url, relay, _shutdown) = boot_relay(Config::default()).await;

    let mut a = connect(&url).await;
    a.send(Message::Text("{not json".to_string())).await.unwrap();
    send(&mut a, json!({"type": "offer", "target_id": "B"})).await;
    send(&mut a, json!({"id": "A", "type": "evaluation"})).await;
    eventually("A registered", || relay.is_registered(&ClientId::from("A"))).await;

    let mut b = connect(&url).await;
    send(&mut b, json!({"id": "B", "type": "evaluation"})).await;
    eventually("B registered", || relay.is_registered(&ClientId::from("B"))).await;

    send(&mut b, json!({"type": "offer", "target_id": "A", "sdp": "s"})).await;
    let forwarded: Value = serde_json::from_str(&recv_text(&mut a).await).unwrap();
    assert_eq!(forwarded["sdp"], "s");
}

#[tokio::test]
async fn signaling_alias_path_is_served() {
    let (url, relay, _shutdown) = boot_relay(Config::default()).await;

    let mut ws = connect(&format!("{url}/signaling")).await;
    send(&mut ws, json!({"id": "A", "type": "signaling_request"})).await;
    eventually("A pending", || relay.is_pending(&ClientId::from("A"))).await;
}

#[tokio::test]
async fn session_cap_refuses_upgrade() {
    let mut config = Config::default();
    config.limits.max_concurrent_sessions = 1;
    let (url, relay, _shutdown) = boot_relay(config).await;

    let mut first = connect(&url).await;
    eventually("first session", || relay.open_sessions() == 1).await;

    match connect_async(url.as_str()).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected refusal, got {:?}", other.map(|(_, r)| r.status())),
    }

    // The slot comes back once the first session ends
    first.close(None).await.unwrap();
    drop(first);
    eventually("slot released", || relay.admitted_sessions() == 0).await;
    let _second = connect(&url).await;
}
