use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::DispatchState;

/// Current relay statistics: connected counts per role, relayed frames,
/// uptime.
pub async fn get_relay_stats(
    State(state): State<DispatchState>,
) -> Result<Json<Value>, AppError> {
    let stats = state.relay.stats().await;

    Ok(Json(json!({
        "ambulances": stats.ambulances,
        "hospitals": stats.hospitals,
        "operators": stats.operators,
        "frames_relayed": stats.frames_relayed,
        "started_at": stats.started_at,
        "uptime_seconds": stats.uptime_seconds
    })))
}

/// Last-known state of every ambulance the relay has heard from.
pub async fn get_fleet(State(state): State<DispatchState>) -> Result<Json<Value>, AppError> {
    let fleet = state.relay.fleet_snapshot().await;
    let ambulances = serde_json::to_value(&fleet)
        .map_err(|e| AppError::Internal(format!("Failed to encode fleet: {}", e)))?;

    Ok(Json(json!({
        "count": fleet.len(),
        "ambulances": ambulances
    })))
}

/// Connection instructions for relay clients.
pub async fn get_relay_info(State(state): State<DispatchState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "websocket_path": "/dispatch/ws/{role}/{id}",
        "roles": ["ambulance", "hospital", "operator"],
        "heartbeat_interval_seconds": state.config.heartbeat_interval_seconds,
        "instructions": {
            "connect": "Connect to /dispatch/ws/{role}/{id} with your role and client UUID",
            "message_format": "JSON frames with a 'type' field in both directions",
            "persistence": "Relay state is in-memory only and lost on restart"
        }
    })))
}
