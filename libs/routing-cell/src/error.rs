use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Invalid coordinates: latitude {lat} / longitude {lng} out of range")]
    InvalidCoordinates { lat: f64, lng: f64 },

    #[error("Invalid speed profile: {0}")]
    InvalidSpeed(String),
}
