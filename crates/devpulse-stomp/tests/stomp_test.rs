// Integration tests for the STOMP transport
//
// Each test runs a tiny in-process broker on a loopback WebSocket and plays one
// scripted session against the transport.

use devpulse_core::{Envelope, Frame, Signal, SignalSink, Subscription};
use devpulse_stomp::frame::{parse_all, StompFrame, CONNECT, DISCONNECT, SUBSCRIBE};
use devpulse_stomp::StompTransport;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

const TOPIC: &str = "/topic/alerts";

type ServerSocket = WebSocketStream<tokio::net::TcpStream>;

/// Start a one-connection broker running `script`, returning its ws:// URL
async fn broker<F, Fut>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        script(socket).await;
    });
    (format!("ws://{}/alert-ws/websocket", addr), handle)
}

async fn read_frame(socket: &mut ServerSocket) -> StompFrame {
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return parse_all(text.as_str()).unwrap().remove(0),
            _ => continue,
        }
    }
}

async fn send_frame(socket: &mut ServerSocket, frame: StompFrame) {
    socket.send(Message::text(frame.encode())).await.unwrap();
}

/// CONNECT / CONNECTED / SUBSCRIBE handshake, checked from the broker side
async fn accept_session(socket: &mut ServerSocket) {
    let connect = read_frame(socket).await;
    assert_eq!(connect.command, CONNECT);
    assert_eq!(connect.header("accept-version"), Some("1.2"));
    send_frame(socket, StompFrame::new("CONNECTED").with_header("version", "1.2")).await;

    let subscribe = read_frame(socket).await;
    assert_eq!(subscribe.command, SUBSCRIBE);
    assert_eq!(subscribe.header("destination"), Some(TOPIC));
}

fn alert_message(id: &str, body: String) -> StompFrame {
    StompFrame::new("MESSAGE")
        .with_header("destination", TOPIC)
        .with_header("message-id", id)
        .with_header("subscription", "sub-0")
        .with_body(body)
}

fn subscribe(url: &str) -> (Subscription, mpsc::Receiver<Envelope>) {
    let transport = StompTransport::new(url, TOPIC)
        .unwrap()
        .with_connect_timeout(Duration::from_secs(2));
    let (tx, rx) = mpsc::channel(16);
    let subscription = Subscription::open(Arc::new(transport), SignalSink::new(1, tx));
    (subscription, rx)
}

async fn next_signal(rx: &mut mpsc::Receiver<Envelope>) -> Signal {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a signal")
        .expect("signal channel closed")
        .signal
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_messages_become_frames_named_by_destination() {
    let body = json!({"id": 1, "ruleName": "HighErrorRate", "message": "error rate 12%"}).to_string();
    let sent = body.clone();
    let (url, server) = broker(move |mut socket| async move {
        accept_session(&mut socket).await;
        send_frame(&mut socket, alert_message("m-1", sent)).await;
        socket.close(None).await.unwrap();
    })
    .await;

    let (_subscription, mut rx) = subscribe(&url);

    assert_eq!(next_signal(&mut rx).await, Signal::Opened);
    assert_eq!(
        next_signal(&mut rx).await,
        Signal::Frame(Frame::new(TOPIC, body).with_id("m-1"))
    );
    assert_eq!(
        next_signal(&mut rx).await,
        Signal::Ended("stream ended".to_string())
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_heartbeats_and_batched_frames() {
    let (url, server) = broker(|mut socket| async move {
        accept_session(&mut socket).await;
        socket.send(Message::text("\n")).await.unwrap();
        let batch = format!(
            "{}{}",
            alert_message("m-1", "{\"message\":\"a\"}".to_string()).encode(),
            alert_message("m-2", "{\"message\":\"b\"}".to_string()).encode()
        );
        socket.send(Message::text(batch)).await.unwrap();
        // Keep the session open until the client goes away
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await;

    let (mut subscription, mut rx) = subscribe(&url);

    assert_eq!(next_signal(&mut rx).await, Signal::Opened);
    assert!(matches!(next_signal(&mut rx).await, Signal::Frame(f) if f.id.as_deref() == Some("m-1")));
    assert!(matches!(next_signal(&mut rx).await, Signal::Frame(f) if f.id.as_deref() == Some("m-2")));

    subscription.close();
    server.await.unwrap();
}

#[tokio::test]
async fn test_broker_error_ends_session() {
    let (url, server) = broker(|mut socket| async move {
        accept_session(&mut socket).await;
        send_frame(
            &mut socket,
            StompFrame::new("ERROR").with_header("message", "destination forbidden"),
        )
        .await;
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await;

    let (_subscription, mut rx) = subscribe(&url);

    assert_eq!(next_signal(&mut rx).await, Signal::Opened);
    match next_signal(&mut rx).await {
        Signal::Ended(message) => {
            assert!(message.contains("destination forbidden"), "got {}", message)
        }
        other => panic!("expected the session to end, got {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_invalid_utf8_binary_frame_is_dropped() {
    let (url, server) = broker(|mut socket| async move {
        accept_session(&mut socket).await;
        let mut garbled = alert_message("m-1", "{\"message\":\"a\"}".to_string())
            .encode()
            .into_bytes();
        garbled.insert(0, 0xff);
        socket.send(Message::binary(garbled)).await.unwrap();
        send_frame(&mut socket, alert_message("m-2", "{\"message\":\"b\"}".to_string())).await;
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await;

    let (_subscription, mut rx) = subscribe(&url);

    assert_eq!(next_signal(&mut rx).await, Signal::Opened);
    assert!(matches!(next_signal(&mut rx).await, Signal::Frame(f) if f.id.as_deref() == Some("m-2")));
    drop(rx);
    server.abort();
}

#[tokio::test]
async fn test_disconnects_when_feed_stops_listening() {
    let (listening_tx, listening_rx) = oneshot::channel::<()>();
    let (url, server) = broker(move |mut socket| async move {
        accept_session(&mut socket).await;
        let _ = listening_rx.await;
        send_frame(&mut socket, alert_message("m-1", "{\"message\":\"a\"}".to_string())).await;
        let goodbye = read_frame(&mut socket).await;
        assert_eq!(goodbye.command, DISCONNECT);
    })
    .await;

    let (_subscription, mut rx) = subscribe(&url);
    assert_eq!(next_signal(&mut rx).await, Signal::Opened);
    drop(rx);
    listening_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("broker never saw DISCONNECT")
        .unwrap();
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_unreachable_broker_reports_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (_subscription, mut rx) = subscribe(&format!("ws://{}/alert-ws/websocket", addr));

    match next_signal(&mut rx).await {
        Signal::Ended(message) => assert!(message.contains("failed to connect"), "got {}", message),
        other => panic!("expected the session to end, got {:?}", other),
    }
}
