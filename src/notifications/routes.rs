use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the notifications router
///
/// # Routes
/// - `GET /ws` - WebSocket gateway (token in `?token=` or bearer header)
/// - `POST /api/notifications/broadcast` - Notify every connection (admin)
/// - `POST /api/notifications/orders/:account_id` - Push an order update (admin)
pub fn notifications_routes() -> Router {
    Router::new()
        .route("/ws", get(handlers::websocket_handler))
        .route(
            "/api/notifications/broadcast",
            post(handlers::broadcast_handler),
        )
        .route(
            "/api/notifications/orders/:account_id",
            post(handlers::order_update_handler),
        )
}
