use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use routing_cell::{GeoPoint, RoutePlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Ambulance,
    Hospital,
    Operator,
}

impl ClientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientRole::Ambulance => "ambulance",
            ClientRole::Hospital => "hospital",
            ClientRole::Operator => "operator",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ambulance" => Ok(ClientRole::Ambulance),
            "hospital" => Ok(ClientRole::Hospital),
            "operator" => Ok(ClientRole::Operator),
            other => Err(format!(
                "Unknown client role '{}', expected ambulance, hospital or operator",
                other
            )),
        }
    }
}

/// Identity of a connected client. One live connection per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey {
    pub role: ClientRole,
    pub id: Uuid,
}

impl ClientKey {
    pub fn new(role: ClientRole, id: Uuid) -> Self {
        Self { role, id }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role, self.id)
    }
}

/// Addressing for generic relayed notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Target {
    Client { role: ClientRole, id: Uuid },
    Role { role: ClientRole },
    All,
}

/// Inbound frames, dispatched on the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PositionUpdate {
        lat: f64,
        lng: f64,
        heading: Option<f64>,
        speed_kmh: Option<f64>,
    },
    AvailabilityChange {
        available: bool,
    },
    DispatchOrder {
        ambulance_id: Uuid,
        hospital_id: Uuid,
        incident: GeoPoint,
        description: Option<String>,
    },
    OrderResponse {
        order_id: Uuid,
        accepted: bool,
        reason: Option<String>,
    },
    ArrivalNotice {
        order_id: Uuid,
        hospital_id: Uuid,
    },
    RouteRequest {
        from: GeoPoint,
        to: GeoPoint,
        emergency: bool,
    },
    Notify {
        target: Target,
        payload: Value,
    },
}

/// Outbound frames, tagged the same way as inbound ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Registered {
        role: ClientRole,
        id: Uuid,
        timestamp: DateTime<Utc>,
    },
    PositionBroadcast {
        ambulance_id: Uuid,
        lat: f64,
        lng: f64,
        heading: Option<f64>,
        speed_kmh: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    AvailabilityChange {
        ambulance_id: Uuid,
        available: bool,
        timestamp: DateTime<Utc>,
    },
    DispatchOrder {
        order_id: Uuid,
        ambulance_id: Uuid,
        hospital_id: Uuid,
        incident: GeoPoint,
        description: Option<String>,
        eta_seconds: Option<u64>,
        timestamp: DateTime<Utc>,
    },
    IncomingAmbulance {
        order_id: Uuid,
        ambulance_id: Uuid,
        eta_seconds: Option<u64>,
        distance_km: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    OrderResponse {
        order_id: Uuid,
        ambulance_id: Uuid,
        accepted: bool,
        reason: Option<String>,
    },
    ArrivalNotice {
        order_id: Uuid,
        ambulance_id: Uuid,
        hospital_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    RouteResult {
        plan: RoutePlan,
        emergency: bool,
    },
    Notification {
        from: ClientKey,
        payload: Value,
    },
    PeerDisconnected {
        role: ClientRole,
        id: Uuid,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Last-known state of an ambulance, kept in memory by the relay.
/// Survives reconnects of other clients but not a process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbulanceSnapshot {
    pub ambulance_id: Uuid,
    pub position: Option<GeoPoint>,
    pub heading: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub available: bool,
    pub updated_at: DateTime<Utc>,
}

impl AmbulanceSnapshot {
    pub fn new(ambulance_id: Uuid) -> Self {
        Self {
            ambulance_id,
            position: None,
            heading: None,
            speed_kmh: None,
            available: true,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStats {
    pub ambulances: usize,
    pub hospitals: usize,
    pub operators: usize,
    pub frames_relayed: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
}
