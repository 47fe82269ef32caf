use axum::{routing::get, Router};

use dispatch_relay_cell::{create_dispatch_relay_router, DispatchState};

pub fn create_router(state: DispatchState) -> Router {
    Router::new()
        .route("/", get(|| async { "Ambulance dispatch relay is running!" }))
        .nest("/dispatch", create_dispatch_relay_router(state))
}
