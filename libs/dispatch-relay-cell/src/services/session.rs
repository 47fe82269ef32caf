use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::{ClientKey, ClientRole, DispatchState};

/// WebSocket entry point at `/ws/{role}/{id}`.
///
/// The role segment is `ambulance`, `hospital`, or `operator`; the id is the
/// client's UUID. All frames in both directions are JSON with a `type` field.
pub async fn ws_handler(
    State(state): State<DispatchState>,
    Path((role, id)): Path<(String, Uuid)>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let role: ClientRole = role.parse().map_err(AppError::BadRequest)?;
    let key = ClientKey::new(role, id);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, key)))
}

async fn handle_socket(socket: WebSocket, state: DispatchState, key: ClientKey) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if let Err(e) = state.relay.register_client(key, tx.clone()).await {
        error!("Failed to register {}: {}", key, e);
        return;
    }

    // Forward task: drain the outbound queue into the socket, pinging on an
    // idle interval. The queue sender being dropped (this session was
    // replaced by a reconnect) ends the loop.
    let heartbeat = Duration::from_secs(state.config.heartbeat_interval_seconds.max(1));
    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    match frame {
                        Some(text) => {
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(heartbeat) => {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let Err(e) = state.relay.handle_frame(&key, text.as_str()).await {
                    warn!("Failed to relay frame from {}: {}", key, e);
                }
            }
            Message::Binary(_) => {
                debug!("Ignoring binary frame from {}", key);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!("Client {} closed the connection", key);
                break;
            }
        }
    }

    forward_task.abort();
    state.relay.disconnect(&key, &tx).await;
}
