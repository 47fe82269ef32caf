use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Client not connected: {0}")]
    ClientUnreachable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Routing error: {0}")]
    Routing(#[from] routing_cell::RoutingError),
}
