use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::models::{BroadcastRequest, DeliveryResponse, GatewayMessage};
use super::services::NotificationGateway;
use crate::auth::extractors::{bearer_token, AuthedUser};
use crate::common::{ApiError, AppState};

/// GET /ws
/// WebSocket upgrade handler
///
/// The upgrade always succeeds; a connection whose token does not verify is
/// closed straight after the handshake.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = params
        .get("token")
        .filter(|t| !t.is_empty())
        .cloned()
        .or_else(|| bearer_token(&headers));

    let gateway = state_lock.read().await.gateway.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, gateway, token))
}

async fn handle_socket(socket: WebSocket, gateway: NotificationGateway, token: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewayMessage>();

    let Some(connection_id) = gateway.connect(token.as_deref(), tx).await else {
        info!("Closing unauthenticated gateway connection");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let active = gateway.registry().connection_count().await;
    info!(
        connection_id = %connection_id,
        active = active,
        "WebSocket connection established"
    );

    // Spawn task to forward queued gateway messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to serialize gateway message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_gateway = gateway.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text(&recv_gateway, &recv_connection_id, &text).await;
                }
                Message::Binary(_) => {
                    warn!(
                        connection_id = %recv_connection_id,
                        "Received unsupported binary message"
                    );
                    send_error(
                        &recv_gateway,
                        &recv_connection_id,
                        "UNSUPPORTED_MESSAGE",
                        "Binary messages not supported",
                    )
                    .await;
                }
                Message::Close(_) => break,
                // axum answers protocol pings itself
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    gateway.disconnect(&connection_id).await;
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

async fn handle_text(gateway: &NotificationGateway, connection_id: &str, text: &str) {
    debug!(connection_id = %connection_id, "Received text message");

    let message: GatewayMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            send_error(
                gateway,
                connection_id,
                "INVALID_MESSAGE",
                &format!("Invalid message format: {}", e),
            )
            .await;
            return;
        }
    };

    if let Err(e) = gateway.handle_client_message(connection_id, message).await {
        warn!(connection_id = %connection_id, error = %e, "Gateway message rejected");
        send_error(gateway, connection_id, e.code(), &e.to_string()).await;
    }
}

async fn send_error(gateway: &NotificationGateway, connection_id: &str, code: &str, message: &str) {
    gateway
        .registry()
        .send_to_connection(
            connection_id,
            GatewayMessage::Error {
                code: code.to_string(),
                message: message.to_string(),
            },
        )
        .await;
}

/// POST /api/notifications/broadcast
/// Sends a notification to every connected client (admin only)
///
/// # Request Body
/// ```json
/// { "message": "Maintenance at 22:00 UTC" }
/// ```
pub async fn broadcast_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<BroadcastRequest>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let gateway = state_lock.read().await.gateway.clone();
    let delivered = gateway.broadcast_notification(&payload.message).await;

    info!(admin_id = authed.id(), delivered = delivered, "Admin broadcast sent");
    Ok(Json(DeliveryResponse { delivered }))
}

/// POST /api/notifications/orders/:account_id
/// Pushes an order update to one account's connections (admin only)
pub async fn order_update_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(account_id): Path<i64>,
    Json(data): Json<Value>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let gateway = state_lock.read().await.gateway.clone();
    let delivered = gateway.send_order_update(account_id, data).await;

    info!(
        admin_id = authed.id(),
        account_id = account_id,
        delivered = delivered,
        "Admin order update sent"
    );
    Ok(Json(DeliveryResponse { delivered }))
}
