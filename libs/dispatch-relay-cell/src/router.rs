use axum::{routing::get, Router};

use crate::handlers::{get_fleet, get_relay_info, get_relay_stats};
use crate::services::session::ws_handler;
use crate::DispatchState;

pub fn create_dispatch_relay_router(state: DispatchState) -> Router {
    Router::new()
        .route("/stats", get(get_relay_stats))
        .route("/fleet", get(get_fleet))
        .route("/info", get(get_relay_info))
        .route("/ws/{role}/{id}", get(ws_handler))
        .with_state(state)
}
