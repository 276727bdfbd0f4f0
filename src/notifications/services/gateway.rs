use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::{ConnectionRegistry, GatewaySender};
use crate::auth::tokens::TokenIssuer;
use crate::common::safe_token_log;
use crate::notifications::models::GatewayMessage;

const MAX_ROOM_LEN: usize = 128;

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("Unknown connection")]
    UnknownConnection,

    #[error("Invalid room name")]
    InvalidRoom,

    #[error("Unsupported message type")]
    UnsupportedMessage,
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UnknownConnection => "UNKNOWN_CONNECTION",
            GatewayError::InvalidRoom => "INVALID_ROOM",
            GatewayError::UnsupportedMessage => "UNSUPPORTED_MESSAGE",
        }
    }
}

/// Per-account room every connection joins on connect
pub fn account_room(account_id: i64) -> String {
    format!("user_{}", account_id)
}

/// Real-time push channel for authenticated clients
///
/// Authenticates the handshake with the access token, keeps room membership
/// in its own [`ConnectionRegistry`] and relays chat messages between room
/// members. Order updates and broadcasts are pushed from the HTTP side.
#[derive(Clone)]
pub struct NotificationGateway {
    registry: ConnectionRegistry,
    tokens: TokenIssuer,
}

impl NotificationGateway {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            tokens,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Authenticates a new connection and registers it.
    ///
    /// Returns the connection id, or `None` when the token is missing or
    /// does not verify. The caller is expected to close the socket then.
    pub async fn connect(&self, token: Option<&str>, sender: GatewaySender) -> Option<String> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            warn!("Gateway handshake without token");
            return None;
        };

        let claims = match self.tokens.verify_access(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(
                    token = %safe_token_log(token),
                    error = %e,
                    "Gateway handshake rejected"
                );
                return None;
            }
        };

        let connection_id = Uuid::new_v4().to_string();
        let account_id = claims.sub;
        let room = account_room(account_id);

        self.registry
            .register(connection_id.clone(), claims, sender)
            .await;
        self.registry.join(&connection_id, &room).await;
        self.registry
            .send_to_connection(&connection_id, GatewayMessage::Connected { account_id, room })
            .await;

        Some(connection_id)
    }

    pub async fn disconnect(&self, connection_id: &str) {
        if self.registry.unregister(connection_id).await.is_none() {
            debug!(connection_id = %connection_id, "Disconnect for unknown connection");
        }
    }

    /// Handles one parsed client event
    pub async fn handle_client_message(
        &self,
        connection_id: &str,
        message: GatewayMessage,
    ) -> Result<(), GatewayError> {
        let claims = self
            .registry
            .claims(connection_id)
            .await
            .ok_or(GatewayError::UnknownConnection)?;

        match message {
            GatewayMessage::JoinRoom { room } => {
                validate_room(&room)?;
                self.registry.join(connection_id, &room).await;
                self.registry
                    .send_to_connection(connection_id, GatewayMessage::JoinedRoom { room })
                    .await;
            }
            GatewayMessage::LeaveRoom { room } => {
                validate_room(&room)?;
                self.registry.leave(connection_id, &room).await;
                self.registry
                    .send_to_connection(connection_id, GatewayMessage::LeftRoom { room })
                    .await;
            }
            GatewayMessage::Message { room, message, .. } => {
                validate_room(&room)?;

                let relayed = GatewayMessage::Message {
                    room: room.clone(),
                    message: message.clone(),
                    user: Some(claims.email.clone()),
                    timestamp: Some(Utc::now().to_rfc3339()),
                };
                let delivered = self.registry.send_to_room(&room, relayed).await;

                debug!(
                    account_id = claims.sub,
                    room = %room,
                    delivered = delivered,
                    "Relayed room message"
                );

                self.registry
                    .send_to_connection(connection_id, GatewayMessage::MessageSent { message })
                    .await;
            }
            GatewayMessage::Ping => {
                self.registry
                    .send_to_connection(connection_id, GatewayMessage::Pong)
                    .await;
            }
            other => {
                warn!(
                    account_id = claims.sub,
                    message_type = ?other,
                    "Received unsupported message type from client"
                );
                return Err(GatewayError::UnsupportedMessage);
            }
        }

        Ok(())
    }

    /// Pushes an order update to every connection of one account
    pub async fn send_order_update(&self, account_id: i64, data: Value) -> usize {
        let delivered = self
            .registry
            .send_to_room(&account_room(account_id), GatewayMessage::OrderUpdate { data })
            .await;

        info!(
            account_id = account_id,
            delivered = delivered,
            "Order update pushed"
        );
        delivered
    }

    /// Pushes a notification to every live connection
    pub async fn broadcast_notification(&self, message: &str) -> usize {
        let delivered = self
            .registry
            .broadcast(GatewayMessage::Notification {
                message: message.to_string(),
                timestamp: Utc::now().to_rfc3339(),
            })
            .await;

        info!(delivered = delivered, "Notification broadcast");
        delivered
    }
}

fn validate_room(room: &str) -> Result<(), GatewayError> {
    if room.trim().is_empty() || room.len() > MAX_ROOM_LEN {
        return Err(GatewayError::InvalidRoom);
    }
    Ok(())
}
