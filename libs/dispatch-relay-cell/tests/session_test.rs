use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use dispatch_relay_cell::{create_dispatch_relay_router, DispatchState};
use shared_config::AppConfig;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn create_test_state(heartbeat_seconds: u64) -> DispatchState {
    let config = Arc::new(AppConfig {
        bind_host: "127.0.0.1".to_string(),
        bind_port: 0,
        heartbeat_interval_seconds: heartbeat_seconds,
        monitor_channel_capacity: 64,
        urban_speed_kmh: 40.0,
        emergency_speed_kmh: 80.0,
    });
    DispatchState::new(config).expect("test config should be valid")
}

/// Serve the relay router on an ephemeral port and return its address.
async fn spawn_relay(heartbeat_seconds: u64) -> SocketAddr {
    let app = create_dispatch_relay_router(create_test_state(heartbeat_seconds));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind an ephemeral port");
    let addr = listener.local_addr().expect("listener should have an address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });

    addr
}

async fn connect_client(addr: SocketAddr, role: &str, id: Uuid) -> WsClient {
    let (ws, _response) = connect_async(format!("ws://{}/ws/{}/{}", addr, role, id))
        .await
        .expect("websocket handshake should succeed");
    ws
}

/// Read the next text frame as JSON, skipping heartbeat pings.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("should receive a frame within timeout")
            .expect("connection should stay open")
            .expect("websocket read should succeed");

        match message {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .expect("relayed frame should be valid JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

async fn assert_silent(ws: &mut WsClient) {
    let result = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "Expected no frame, got {:?}", result);
}

#[tokio::test]
async fn test_registered_ack_is_the_first_frame_on_the_socket() {
    let addr = spawn_relay(30).await;
    let id = Uuid::new_v4();

    let mut ambulance = connect_client(addr, "ambulance", id).await;

    let ack = recv_json(&mut ambulance).await;
    assert_eq!(ack["type"], "registered", "Ack must arrive before anything else");
    assert_eq!(ack["role"], "ambulance");
    assert_eq!(ack["id"], json!(id));
}

#[tokio::test]
async fn test_binary_frames_are_ignored_and_session_survives() {
    let addr = spawn_relay(30).await;

    let mut ambulance = connect_client(addr, "ambulance", Uuid::new_v4()).await;
    let mut operator = connect_client(addr, "operator", Uuid::new_v4()).await;
    recv_json(&mut ambulance).await;
    recv_json(&mut operator).await;

    ambulance
        .send(Message::Binary(vec![0xde, 0xad, 0xbe, 0xef].into()))
        .await
        .expect("binary send should succeed");

    // The binary frame produces neither an error nor any fan-out...
    let position = json!({ "type": "position_update", "lat": 19.43, "lng": -99.13 });
    ambulance
        .send(Message::text(position.to_string()))
        .await
        .expect("text send should succeed");

    // ...and the session keeps relaying afterwards.
    let frame = recv_json(&mut operator).await;
    assert_eq!(frame["type"], "position_broadcast");
    assert_eq!(frame["lat"], 19.43);

    assert_silent(&mut ambulance).await;
}

#[tokio::test]
async fn test_close_broadcasts_peer_disconnected_to_operators() {
    let addr = spawn_relay(30).await;
    let ambulance_id = Uuid::new_v4();

    let mut operator = connect_client(addr, "operator", Uuid::new_v4()).await;
    recv_json(&mut operator).await;

    let mut ambulance = connect_client(addr, "ambulance", ambulance_id).await;
    recv_json(&mut ambulance).await;

    ambulance.close(None).await.expect("close should succeed");

    let frame = recv_json(&mut operator).await;
    assert_eq!(frame["type"], "peer_disconnected");
    assert_eq!(frame["role"], "ambulance");
    assert_eq!(frame["id"], json!(ambulance_id));
}

#[tokio::test]
async fn test_heartbeat_ping_reaches_idle_clients() {
    let addr = spawn_relay(1).await;

    let mut hospital = connect_client(addr, "hospital", Uuid::new_v4()).await;
    recv_json(&mut hospital).await;

    let message = timeout(Duration::from_secs(3), hospital.next())
        .await
        .expect("heartbeat should arrive within timeout")
        .expect("connection should stay open")
        .expect("websocket read should succeed");
    assert!(
        matches!(message, Message::Ping(_)),
        "Idle connection should be pinged, got {:?}",
        message
    );
}

#[tokio::test]
async fn test_unknown_role_is_rejected_at_the_upgrade() {
    let addr = spawn_relay(30).await;

    let result = connect_async(format!("ws://{}/ws/bus/{}", addr, Uuid::new_v4())).await;
    assert!(result.is_err(), "Handshake for an unknown role must fail");
}

#[tokio::test]
async fn test_frames_relayed_over_real_sockets_end_to_end() {
    let addr = spawn_relay(30).await;

    let mut ambulance = connect_client(addr, "ambulance", Uuid::new_v4()).await;
    let mut hospital = connect_client(addr, "hospital", Uuid::new_v4()).await;
    recv_json(&mut ambulance).await;
    recv_json(&mut hospital).await;

    let request = json!({
        "type": "route_request",
        "from": { "lat": 19.4326, "lng": -99.1332 },
        "to": { "lat": 19.3985, "lng": -99.2033 },
        "emergency": true
    });
    hospital
        .send(Message::text(request.to_string()))
        .await
        .expect("text send should succeed");

    let frame = recv_json(&mut hospital).await;
    assert_eq!(frame["type"], "route_result");
    assert!(frame["plan"]["eta_seconds"].as_u64().unwrap() > 0);

    assert_silent(&mut ambulance).await;
}
