//! Router composition shared by the binary and the HTTP tests

use axum::{
    extract::Extension,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, access::enforce_access};
use crate::common::{AppConfig, AppState};
use crate::logging_middleware;
use crate::notifications;
use crate::users;

#[cfg(test)]
mod tests;

/// Builds the full application router over shared state.
pub fn build_router(shared: Arc<RwLock<AppState>>, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // ACCOUNT MANAGEMENT ROUTES
        // ====================================================================
        .merge(users::users_routes())
        // ====================================================================
        // NOTIFICATION ROUTES (WebSocket gateway and admin pushes)
        // ====================================================================
        .merge(notifications::notifications_routes())
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(middleware::from_fn(enforce_access))
        .layer(Extension(shared))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}
