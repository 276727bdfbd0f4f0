use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::auth::models::Claims;
use crate::notifications::models::GatewayMessage;

pub type GatewaySender = mpsc::UnboundedSender<GatewayMessage>;

/// State kept for one authenticated connection
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub claims: Claims,
    pub rooms: HashSet<String>,
    sender: GatewaySender,
}

#[derive(Default)]
struct RegistryInner {
    // connection_id -> connection state
    connections: HashMap<String, ConnectionState>,
    // room -> connection_ids
    rooms: HashMap<String, HashSet<String>>,
}

/// Live connections and room membership for one gateway instance
///
/// Entries exist only between connect and disconnect. One lock covers both
/// maps so membership and connection state never disagree.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: String, claims: Claims, sender: GatewaySender) {
        let account_id = claims.sub;
        let state = ConnectionState {
            claims,
            rooms: HashSet::new(),
            sender,
        };

        self.inner
            .write()
            .await
            .connections
            .insert(connection_id.clone(), state);

        info!(
            account_id = account_id,
            connection_id = %connection_id,
            "Gateway connection registered"
        );
    }

    /// Removes the connection and its memberships; returns its claims.
    pub async fn unregister(&self, connection_id: &str) -> Option<Claims> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let state = inner.connections.remove(connection_id)?;

        for room in &state.rooms {
            if let Some(members) = inner.rooms.get_mut(room) {
                members.remove(connection_id);
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
            }
        }

        info!(
            account_id = state.claims.sub,
            connection_id = %connection_id,
            "Gateway connection unregistered"
        );
        Some(state.claims)
    }

    /// Returns false when the connection is unknown.
    pub async fn join(&self, connection_id: &str, room: &str) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(state) = inner.connections.get_mut(connection_id) else {
            return false;
        };
        state.rooms.insert(room.to_string());

        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());

        debug!(connection_id = %connection_id, room = %room, "Joined room");
        true
    }

    /// Returns false when the connection is unknown.
    pub async fn leave(&self, connection_id: &str, room: &str) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(state) = inner.connections.get_mut(connection_id) else {
            return false;
        };
        state.rooms.remove(room);

        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(connection_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }

        debug!(connection_id = %connection_id, room = %room, "Left room");
        true
    }

    pub async fn claims(&self, connection_id: &str) -> Option<Claims> {
        self.inner
            .read()
            .await
            .connections
            .get(connection_id)
            .map(|state| state.claims.clone())
    }

    #[cfg(test)]
    pub async fn connection(&self, connection_id: &str) -> Option<ConnectionState> {
        self.inner.read().await.connections.get(connection_id).cloned()
    }

    #[cfg(test)]
    pub async fn room_members(&self, room: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Send a message to a specific connection
    pub async fn send_to_connection(&self, connection_id: &str, message: GatewayMessage) -> bool {
        let inner = self.inner.read().await;
        match inner.connections.get(connection_id) {
            Some(state) => state.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Send a message to every member of a room; returns the delivery count.
    pub async fn send_to_room(&self, room: &str, message: GatewayMessage) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };

        members
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .filter(|state| state.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Send a message to every connection; returns the delivery count.
    pub async fn broadcast(&self, message: GatewayMessage) -> usize {
        let inner = self.inner.read().await;
        inner
            .connections
            .values()
            .filter(|state| state.sender.send(message.clone()).is_ok())
            .count()
    }
}
