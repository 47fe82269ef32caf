use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, warn};

use crate::{ClientKey, ClientRole, RelayError};

pub type OutboundSender = mpsc::UnboundedSender<String>;
pub type MonitorReceiver = broadcast::Receiver<String>;

/// In-memory registry of connected clients.
///
/// Maps each `ClientKey` to the outbound queue of its WebSocket session.
/// A second registration under the same key replaces the first; dropping
/// the replaced sender closes the old session's forward loop. Every frame
/// that passes through is mirrored on a broadcast monitor channel.
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ClientKey, OutboundSender>>>,
    monitor: broadcast::Sender<String>,
}

impl ConnectionRegistry {
    pub fn new(monitor_capacity: usize) -> Self {
        let (monitor, _) = broadcast::channel(monitor_capacity.max(1));

        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            monitor,
        }
    }

    /// Register a client connection. Returns the sender it replaced, if any.
    pub async fn register(
        &self,
        key: ClientKey,
        sender: OutboundSender,
    ) -> Option<OutboundSender> {
        let mut connections = self.connections.write().await;
        let replaced = connections.insert(key, sender);

        if replaced.is_some() {
            debug!("Replaced existing connection for {}", key);
        } else {
            debug!("Registered connection for {}", key);
        }

        replaced
    }

    /// Remove a client connection, but only if `sender` is still the one
    /// stored for the key. A session that was replaced by a newer connection
    /// must not evict its replacement during cleanup.
    pub async fn unregister(&self, key: &ClientKey, sender: &OutboundSender) -> bool {
        let mut connections = self.connections.write().await;

        match connections.get(key) {
            Some(current) if current.same_channel(sender) => {
                connections.remove(key);
                debug!("Unregistered connection for {}", key);
                true
            }
            _ => false,
        }
    }

    pub async fn is_connected(&self, key: &ClientKey) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(key)
    }

    /// Deliver a frame to one client. A client whose session receiver is
    /// gone gets evicted here instead of lingering in the map.
    pub async fn send_to(&self, key: &ClientKey, frame: &str) -> Result<(), RelayError> {
        let sender = {
            let connections = self.connections.read().await;
            connections.get(key).cloned()
        };

        let Some(sender) = sender else {
            return Err(RelayError::ClientUnreachable(key.to_string()));
        };

        if sender.send(frame.to_string()).is_err() {
            warn!("Connection for {} is gone, evicting", key);
            self.unregister(key, &sender).await;
            return Err(RelayError::ClientUnreachable(key.to_string()));
        }

        self.mirror(frame);
        Ok(())
    }

    /// Fan a frame out to every client with the given role, except `skip`.
    /// Returns how many clients it was delivered to.
    pub async fn broadcast_role(
        &self,
        role: ClientRole,
        frame: &str,
        skip: Option<&ClientKey>,
    ) -> usize {
        self.broadcast_where(frame, skip, |key| key.role == role).await
    }

    /// Fan a frame out to every connected client, except `skip`.
    pub async fn broadcast_all(&self, frame: &str, skip: Option<&ClientKey>) -> usize {
        self.broadcast_where(frame, skip, |_| true).await
    }

    pub async fn connected(&self, role: ClientRole) -> usize {
        let connections = self.connections.read().await;
        connections.keys().filter(|key| key.role == role).count()
    }

    pub async fn client_keys(&self, role: ClientRole) -> Vec<ClientKey> {
        let connections = self.connections.read().await;
        connections
            .keys()
            .filter(|key| key.role == role)
            .copied()
            .collect()
    }

    /// Subscribe to the monitor feed carrying every relayed frame.
    pub fn subscribe_monitor(&self) -> MonitorReceiver {
        self.monitor.subscribe()
    }

    async fn broadcast_where<F>(
        &self,
        frame: &str,
        skip: Option<&ClientKey>,
        matches: F,
    ) -> usize
    where
        F: Fn(&ClientKey) -> bool,
    {
        let mut delivered = 0;
        let mut dead: Vec<(ClientKey, OutboundSender)> = Vec::new();

        {
            let connections = self.connections.read().await;
            for (key, sender) in connections.iter() {
                if Some(key) == skip || !matches(key) {
                    continue;
                }
                if sender.send(frame.to_string()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push((*key, sender.clone()));
                }
            }
        }

        for (key, sender) in dead {
            warn!("Connection for {} is gone, evicting", key);
            self.unregister(&key, &sender).await;
        }

        if delivered > 0 {
            self.mirror(frame);
        }

        delivered
    }

    fn mirror(&self, frame: &str) {
        // Best effort: no monitor subscribers is the normal case.
        let _ = self.monitor.send(frame.to_string());
    }
}

impl Clone for ConnectionRegistry {
    fn clone(&self) -> Self {
        Self {
            connections: Arc::clone(&self.connections),
            monitor: self.monitor.clone(),
        }
    }
}
