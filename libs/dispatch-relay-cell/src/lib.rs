use std::sync::Arc;

use shared_config::AppConfig;

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::*;
pub use models::*;
pub use router::create_dispatch_relay_router;
pub use services::registry::{ConnectionRegistry, OutboundSender};
pub use services::relay::DispatchRelayService;

/// Shared state for the dispatch relay routes: the process-wide relay
/// service plus the loaded configuration.
#[derive(Clone)]
pub struct DispatchState {
    pub config: Arc<AppConfig>,
    pub relay: DispatchRelayService,
}

impl DispatchState {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, RelayError> {
        let relay = DispatchRelayService::new(&config)?;
        Ok(Self { config, relay })
    }
}
