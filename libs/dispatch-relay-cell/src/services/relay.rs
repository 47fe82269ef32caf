use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use routing_cell::{GeoPoint, RoutePlanner, SpeedProfile};
use shared_config::AppConfig;

use crate::services::registry::{ConnectionRegistry, OutboundSender};
use crate::{
    AmbulanceSnapshot, ClientKey, ClientMessage, ClientRole, RelayError, RelayStats,
    ServerMessage, Target,
};

/// The dispatch relay: one registry, one message-type dispatcher.
///
/// All state lives in this process. Registered connections, last-known
/// ambulance positions, and availability are lost on restart; relayed
/// frames carry no acknowledgment or retry semantics.
pub struct DispatchRelayService {
    registry: ConnectionRegistry,
    planner: RoutePlanner,
    fleet: Arc<RwLock<HashMap<Uuid, AmbulanceSnapshot>>>,
    frames_relayed: Arc<AtomicU64>,
    started_at: DateTime<Utc>,
}

impl DispatchRelayService {
    pub fn new(config: &AppConfig) -> Result<Self, RelayError> {
        let profile = SpeedProfile {
            urban_kmh: config.urban_speed_kmh,
            emergency_kmh: config.emergency_speed_kmh,
        };

        Ok(Self {
            registry: ConnectionRegistry::new(config.monitor_channel_capacity),
            planner: RoutePlanner::new(profile)?,
            fleet: Arc::new(RwLock::new(HashMap::new())),
            frames_relayed: Arc::new(AtomicU64::new(0)),
            started_at: Utc::now(),
        })
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a session and acknowledge it. A previous connection under
    /// the same key is replaced; dropping its sender ends its forward loop.
    pub async fn register_client(
        &self,
        key: ClientKey,
        sender: OutboundSender,
    ) -> Result<(), RelayError> {
        let replaced = self.registry.register(key, sender).await;
        if replaced.is_some() {
            info!("Client {} reconnected, previous session replaced", key);
        } else {
            info!("Client {} connected", key);
        }

        let ack = ServerMessage::Registered {
            role: key.role,
            id: key.id,
            timestamp: Utc::now(),
        };
        self.registry.send_to(&key, &serde_json::to_string(&ack)?).await
    }

    /// Tear a session down. Operators are told about the departure; a
    /// session that was already replaced leaves no trace.
    pub async fn disconnect(&self, key: &ClientKey, sender: &OutboundSender) {
        if !self.registry.unregister(key, sender).await {
            return;
        }

        info!("Client {} disconnected", key);

        let frame = ServerMessage::PeerDisconnected {
            role: key.role,
            id: key.id,
        };
        match serde_json::to_string(&frame) {
            Ok(text) => {
                self.registry
                    .broadcast_role(ClientRole::Operator, &text, Some(key))
                    .await;
            }
            Err(e) => warn!("Failed to encode peer_disconnected for {}: {}", key, e),
        }
    }

    /// Parse one inbound frame and route it. Bad input is answered with an
    /// `error` frame on the sender's own connection; the session stays open.
    pub async fn handle_frame(&self, sender: &ClientKey, text: &str) -> Result<(), RelayError> {
        let frame: ClientMessage = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Malformed frame from {}: {}", sender, e);
                return self
                    .send_error(sender, "malformed_frame", &format!("Could not parse frame: {}", e))
                    .await;
            }
        };

        self.frames_relayed.fetch_add(1, Ordering::Relaxed);

        match frame {
            ClientMessage::PositionUpdate {
                lat,
                lng,
                heading,
                speed_kmh,
            } => {
                self.handle_position_update(sender, lat, lng, heading, speed_kmh)
                    .await
            }
            ClientMessage::AvailabilityChange { available } => {
                self.handle_availability_change(sender, available).await
            }
            ClientMessage::DispatchOrder {
                ambulance_id,
                hospital_id,
                incident,
                description,
            } => {
                self.handle_dispatch_order(sender, ambulance_id, hospital_id, incident, description)
                    .await
            }
            ClientMessage::OrderResponse {
                order_id,
                accepted,
                reason,
            } => self.handle_order_response(sender, order_id, accepted, reason).await,
            ClientMessage::ArrivalNotice {
                order_id,
                hospital_id,
            } => self.handle_arrival_notice(sender, order_id, hospital_id).await,
            ClientMessage::RouteRequest {
                from,
                to,
                emergency,
            } => self.handle_route_request(sender, from, to, emergency).await,
            ClientMessage::Notify { target, payload } => {
                self.handle_notify(sender, target, payload).await
            }
        }
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            ambulances: self.registry.connected(ClientRole::Ambulance).await,
            hospitals: self.registry.connected(ClientRole::Hospital).await,
            operators: self.registry.connected(ClientRole::Operator).await,
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    pub async fn fleet_snapshot(&self) -> Vec<AmbulanceSnapshot> {
        let fleet = self.fleet.read().await;
        fleet.values().cloned().collect()
    }

    // Per-type handlers

    async fn handle_position_update(
        &self,
        sender: &ClientKey,
        lat: f64,
        lng: f64,
        heading: Option<f64>,
        speed_kmh: Option<f64>,
    ) -> Result<(), RelayError> {
        if sender.role != ClientRole::Ambulance {
            return self.reject_role(sender, "position_update").await;
        }

        let position = GeoPoint::new(lat, lng);
        if !position.in_range() {
            return self
                .send_error(sender, "invalid_position", "Coordinates out of range")
                .await;
        }

        {
            let mut fleet = self.fleet.write().await;
            let snapshot = fleet
                .entry(sender.id)
                .or_insert_with(|| AmbulanceSnapshot::new(sender.id));
            snapshot.position = Some(position);
            snapshot.heading = heading;
            snapshot.speed_kmh = speed_kmh;
            snapshot.updated_at = Utc::now();
        }

        let frame = serde_json::to_string(&ServerMessage::PositionBroadcast {
            ambulance_id: sender.id,
            lat,
            lng,
            heading,
            speed_kmh,
            timestamp: Utc::now(),
        })?;

        let hospitals = self
            .registry
            .broadcast_role(ClientRole::Hospital, &frame, Some(sender))
            .await;
        let operators = self
            .registry
            .broadcast_role(ClientRole::Operator, &frame, Some(sender))
            .await;
        debug!(
            "Position of {} fanned out to {} hospitals, {} operators",
            sender, hospitals, operators
        );

        Ok(())
    }

    async fn handle_availability_change(
        &self,
        sender: &ClientKey,
        available: bool,
    ) -> Result<(), RelayError> {
        if sender.role != ClientRole::Ambulance {
            return self.reject_role(sender, "availability_change").await;
        }

        {
            let mut fleet = self.fleet.write().await;
            let snapshot = fleet
                .entry(sender.id)
                .or_insert_with(|| AmbulanceSnapshot::new(sender.id));
            snapshot.available = available;
            snapshot.updated_at = Utc::now();
        }

        let frame = serde_json::to_string(&ServerMessage::AvailabilityChange {
            ambulance_id: sender.id,
            available,
            timestamp: Utc::now(),
        })?;
        self.registry
            .broadcast_role(ClientRole::Operator, &frame, Some(sender))
            .await;

        Ok(())
    }

    async fn handle_dispatch_order(
        &self,
        sender: &ClientKey,
        ambulance_id: Uuid,
        hospital_id: Uuid,
        incident: GeoPoint,
        description: Option<String>,
    ) -> Result<(), RelayError> {
        if sender.role != ClientRole::Operator {
            return self.reject_role(sender, "dispatch_order").await;
        }

        if !incident.in_range() {
            return self
                .send_error(sender, "invalid_position", "Incident coordinates out of range")
                .await;
        }

        let ambulance = ClientKey::new(ClientRole::Ambulance, ambulance_id);
        if !self.registry.is_connected(&ambulance).await {
            return self
                .send_error(
                    sender,
                    "unknown_ambulance",
                    &format!("Ambulance {} is not connected", ambulance_id),
                )
                .await;
        }

        let hospital = ClientKey::new(ClientRole::Hospital, hospital_id);
        if !self.registry.is_connected(&hospital).await {
            return self
                .send_error(
                    sender,
                    "unknown_hospital",
                    &format!("Hospital {} is not connected", hospital_id),
                )
                .await;
        }

        let order_id = Uuid::new_v4();

        // ETA from the ambulance's last-known position, when we have one.
        let last_position = {
            let fleet = self.fleet.read().await;
            fleet.get(&ambulance_id).and_then(|snapshot| snapshot.position)
        };
        let (eta_seconds, distance_km) = match last_position {
            Some(position) => match self.planner.plan_route(position, incident, true) {
                Ok(plan) => (Some(plan.eta_seconds), Some(plan.distance_km)),
                Err(e) => {
                    warn!("Route planning failed for order {}: {}", order_id, e);
                    (None, None)
                }
            },
            None => (None, None),
        };

        info!(
            "Dispatch order {} from {}: ambulance {} to incident, hospital {}",
            order_id, sender, ambulance_id, hospital_id
        );

        let order = serde_json::to_string(&ServerMessage::DispatchOrder {
            order_id,
            ambulance_id,
            hospital_id,
            incident,
            description,
            eta_seconds,
            timestamp: Utc::now(),
        })?;
        // The ambulance may have dropped off between the connectivity check
        // and the send; answer the operator the same way as an unknown one.
        if let Err(e) = self.registry.send_to(&ambulance, &order).await {
            return match e {
                RelayError::ClientUnreachable(_) => {
                    self.send_error(
                        sender,
                        "unknown_ambulance",
                        &format!("Ambulance {} is not connected", ambulance_id),
                    )
                    .await
                }
                other => Err(other),
            };
        }

        // The operator keeps a copy carrying the assigned order id. Losing
        // it must not keep the hospital from being notified.
        if let Err(e) = self.registry.send_to(sender, &order).await {
            debug!("Could not deliver order copy to {}: {}", sender, e);
        }

        let notice = serde_json::to_string(&ServerMessage::IncomingAmbulance {
            order_id,
            ambulance_id,
            eta_seconds,
            distance_km,
            timestamp: Utc::now(),
        })?;
        if let Err(e) = self.registry.send_to(&hospital, &notice).await {
            warn!("Could not deliver incoming_ambulance to {}: {}", hospital, e);
        }

        Ok(())
    }

    async fn handle_order_response(
        &self,
        sender: &ClientKey,
        order_id: Uuid,
        accepted: bool,
        reason: Option<String>,
    ) -> Result<(), RelayError> {
        if sender.role != ClientRole::Ambulance {
            return self.reject_role(sender, "order_response").await;
        }

        let frame = serde_json::to_string(&ServerMessage::OrderResponse {
            order_id,
            ambulance_id: sender.id,
            accepted,
            reason,
        })?;
        self.registry
            .broadcast_role(ClientRole::Operator, &frame, Some(sender))
            .await;

        Ok(())
    }

    async fn handle_arrival_notice(
        &self,
        sender: &ClientKey,
        order_id: Uuid,
        hospital_id: Uuid,
    ) -> Result<(), RelayError> {
        if sender.role != ClientRole::Ambulance {
            return self.reject_role(sender, "arrival_notice").await;
        }

        let hospital = ClientKey::new(ClientRole::Hospital, hospital_id);
        if !self.registry.is_connected(&hospital).await {
            return self
                .send_error(
                    sender,
                    "unknown_hospital",
                    &format!("Hospital {} is not connected", hospital_id),
                )
                .await;
        }

        let frame = serde_json::to_string(&ServerMessage::ArrivalNotice {
            order_id,
            ambulance_id: sender.id,
            hospital_id,
            timestamp: Utc::now(),
        })?;
        self.registry.send_to(&hospital, &frame).await?;
        self.registry
            .broadcast_role(ClientRole::Operator, &frame, Some(sender))
            .await;

        Ok(())
    }

    async fn handle_route_request(
        &self,
        sender: &ClientKey,
        from: GeoPoint,
        to: GeoPoint,
        emergency: bool,
    ) -> Result<(), RelayError> {
        match self.planner.plan_route(from, to, emergency) {
            Ok(plan) => {
                let frame = serde_json::to_string(&ServerMessage::RouteResult {
                    plan,
                    emergency,
                })?;
                self.registry.send_to(sender, &frame).await
            }
            Err(e) => {
                self.send_error(sender, "route_failed", &e.to_string()).await
            }
        }
    }

    async fn handle_notify(
        &self,
        sender: &ClientKey,
        target: Target,
        payload: Value,
    ) -> Result<(), RelayError> {
        let frame = serde_json::to_string(&ServerMessage::Notification {
            from: *sender,
            payload,
        })?;

        match target {
            Target::Client { role, id } => {
                let key = ClientKey::new(role, id);
                if self.registry.send_to(&key, &frame).await.is_err() {
                    return self
                        .send_error(
                            sender,
                            "unknown_target",
                            &format!("Client {} is not connected", key),
                        )
                        .await;
                }
            }
            Target::Role { role } => {
                self.registry.broadcast_role(role, &frame, Some(sender)).await;
            }
            Target::All => {
                self.registry.broadcast_all(&frame, Some(sender)).await;
            }
        }

        Ok(())
    }

    // Error replies

    async fn reject_role(&self, sender: &ClientKey, frame_type: &str) -> Result<(), RelayError> {
        self.send_error(
            sender,
            "role_not_allowed",
            &format!("Role {} may not send {}", sender.role, frame_type),
        )
        .await
    }

    async fn send_error(
        &self,
        recipient: &ClientKey,
        code: &str,
        message: &str,
    ) -> Result<(), RelayError> {
        debug!("Error frame to {}: {} ({})", recipient, code, message);

        let frame = serde_json::to_string(&ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        })?;

        // The recipient may already be gone; that is not the caller's fault.
        if let Err(e) = self.registry.send_to(recipient, &frame).await {
            debug!("Could not deliver error frame to {}: {}", recipient, e);
        }
        Ok(())
    }
}

impl Clone for DispatchRelayService {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            planner: self.planner.clone(),
            fleet: Arc::clone(&self.fleet),
            frames_relayed: Arc::clone(&self.frames_relayed),
            started_at: self.started_at,
        }
    }
}
