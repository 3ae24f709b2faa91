//! Integration tests for the WebSocket fan-out endpoint and the HTTP boundary.

use clap::Parser;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use service::{config::Config, AppState};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for a frame that should arrive.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding that no frame is coming.
const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Helper: start the server on a random port with the given extra flags.
async fn start_test_server(extra_args: &[&str]) -> (SocketAddr, AppState) {
    let mut args = vec!["fanout_server", "--static-dir", "/nonexistent/fanout-static"];
    args.extend_from_slice(extra_args);
    let app_state = AppState::new(Config::parse_from(args));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_state = app_state.clone();
    tokio::spawn(async move {
        web::serve(listener, server_state).await.unwrap();
    });

    (addr, app_state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _response) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("WebSocket handshake failed");
    client
}

async fn send_json(client: &mut Client, payload: Value) {
    client
        .send(Message::Text(payload.to_string()))
        .await
        .unwrap();
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Stream ended")
            .expect("WebSocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
}

async fn assert_quiet(client: &mut Client) {
    let result = tokio::time::timeout(QUIET_PERIOD, client.next()).await;
    assert!(result.is_err(), "Expected no frame, got {result:?}");
}

/// Waits until the registry reaches `expected` users, since cleanup runs on the server's own schedule.
async fn wait_for_registered(app_state: &AppState, expected: usize) {
    wait_for_registered_within(app_state, expected, Duration::from_secs(1)).await;
}

async fn wait_for_registered_within(app_state: &AppState, expected: usize, limit: Duration) {
    let registry = app_state.fanout_ref().registry();
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "Registry has {} users, expected {}",
        registry.len(),
        expected
    );
}

#[tokio::test]
async fn test_echo_fan_out_and_departure_notice() {
    let (addr, app_state) = start_test_server(&[]).await;

    let mut alice = connect(addr).await;
    send_json(&mut alice, json!({"user": "alice", "message": "hi"})).await;
    assert_eq!(
        recv_json(&mut alice).await,
        json!({"user": "alice", "message": "hi"})
    );

    let mut bob = connect(addr).await;
    send_json(&mut bob, json!({"user": "bob", "message": "yo"})).await;
    assert_eq!(
        recv_json(&mut alice).await,
        json!({"user": "bob", "message": "yo"})
    );
    assert_eq!(
        recv_json(&mut bob).await,
        json!({"user": "bob", "message": "yo"})
    );

    bob.close(None).await.unwrap();

    assert_eq!(
        recv_json(&mut alice).await,
        json!({"user": "bob", "message": "User bob has disconnected"})
    );
    wait_for_registered(&app_state, 1).await;
    assert!(app_state.fanout_ref().registry().contains("alice"));
    assert_quiet(&mut alice).await;
}

#[tokio::test]
async fn test_invalid_payloads_are_dropped_without_closing() {
    let (addr, app_state) = start_test_server(&[]).await;
    let mut client = connect(addr).await;

    send_json(&mut client, json!({"user": "carol"})).await;
    send_json(&mut client, json!({"user": "", "message": "empty user"})).await;
    client
        .send(Message::Text("definitely not json".to_string()))
        .await
        .unwrap();
    send_json(&mut client, json!({"user": "carol", "message": "valid"})).await;

    assert_eq!(
        recv_json(&mut client).await,
        json!({"user": "carol", "message": "valid"})
    );
    assert_eq!(app_state.fanout_ref().registry().len(), 1);
}

#[tokio::test]
async fn test_silent_client_disconnect_broadcasts_nothing() {
    let (addr, app_state) = start_test_server(&[]).await;

    let mut alice = connect(addr).await;
    send_json(&mut alice, json!({"user": "alice", "message": "hi"})).await;
    recv_json(&mut alice).await;

    let mut lurker = connect(addr).await;
    lurker.close(None).await.unwrap();

    assert_quiet(&mut alice).await;
    assert_eq!(app_state.fanout_ref().registry().len(), 1);
}

#[tokio::test]
async fn test_session_timeout_closes_with_normal_closure() {
    let (addr, app_state) = start_test_server(&["--session-timeout-secs", "1"]).await;

    let mut client = connect(addr).await;
    send_json(&mut client, json!({"user": "dave", "message": "hello"})).await;
    recv_json(&mut client).await;

    let close_frame = loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("Timed out waiting for close")
            .expect("Stream ended without a close frame")
            .expect("WebSocket error");
        if let Message::Close(frame) = frame {
            break frame;
        }
    };
    let close_frame = close_frame.expect("Close frame without a status");
    assert_eq!(close_frame.code, CloseCode::Normal);
    assert_eq!(close_frame.reason, "session expired");

    // Finish the closing handshake, which is what lets the server clean up
    let _ = client.close(None).await;
    wait_for_registered(&app_state, 0).await;
}

#[tokio::test]
async fn test_client_ignoring_close_is_dropped_after_grace_period() {
    let (addr, app_state) = start_test_server(&[
        "--session-timeout-secs",
        "1",
        "--close-grace-secs",
        "1",
    ])
    .await;

    let mut client = connect(addr).await;
    send_json(&mut client, json!({"user": "erin", "message": "hello"})).await;
    recv_json(&mut client).await;
    wait_for_registered(&app_state, 1).await;

    // The client stays connected but never reads again, so it never answers
    // the server's close frame. The server must still clean up.
    wait_for_registered_within(&app_state, 0, Duration::from_secs(5)).await;
    assert!(!app_state.fanout_ref().registry().contains("erin"));

    drop(client);
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (addr, _app_state) = start_test_server(&[]).await;

    let response = reqwest::get(format!("http://{}/nowhere", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "The route could not be found"}));
}

#[tokio::test]
async fn test_static_files_are_served() -> anyhow::Result<()> {
    let static_dir = tempfile::tempdir()?;
    std::fs::write(static_dir.path().join("index.html"), "<h1>chat</h1>")?;
    let static_path = static_dir.path().to_str().unwrap().to_string();

    let app_state = AppState::new(Config::parse_from([
        "fanout_server",
        "--static-dir",
        static_path.as_str(),
    ]));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(web::serve(listener, app_state));

    let response = reqwest::get(format!("http://{}/index.html", addr)).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await?, "<h1>chat</h1>");

    let missing = reqwest::get(format!("http://{}/missing.css", addr)).await?;
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    Ok(())
}
