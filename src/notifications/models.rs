use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Gateway wire messages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    // Client → Server
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    /// Sent by a client to relay into a room; the gateway fills `user` and
    /// `timestamp` before fanning it out, ignoring any client-supplied values.
    Message {
        room: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    Ping,

    // Server → Client
    Connected {
        account_id: i64,
        room: String,
    },
    JoinedRoom {
        room: String,
    },
    LeftRoom {
        room: String,
    },
    MessageSent {
        message: String,
    },
    OrderUpdate {
        data: Value,
    },
    Notification {
        message: String,
        timestamp: String,
    },
    Pong,
    Error {
        code: String,
        message: String,
    },
}

// ============================================================================
// Request/Response Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub delivered: usize,
}
