use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub heartbeat_interval_seconds: u64,
    pub monitor_channel_capacity: usize,
    pub urban_speed_kmh: f64,
    pub emergency_speed_kmh: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_host: env::var("DISPATCH_BIND_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: parse_var("DISPATCH_BIND_PORT", 3000),
            heartbeat_interval_seconds: parse_var("DISPATCH_HEARTBEAT_SECONDS", 30),
            monitor_channel_capacity: parse_var("DISPATCH_MONITOR_CAPACITY", 1000),
            urban_speed_kmh: parse_var("DISPATCH_URBAN_SPEED_KMH", 40.0),
            emergency_speed_kmh: parse_var("DISPATCH_EMERGENCY_SPEED_KMH", 80.0),
        };

        if config.heartbeat_interval_seconds == 0 {
            warn!("DISPATCH_HEARTBEAT_SECONDS is 0, sessions clamp it to 1 second");
        }

        config
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
