// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::body::to_bytes;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{debug, Level};

use crate::common::helpers::redact_sensitive;

const MAX_LOGGED_BODY: usize = 1024 * 1024;

/// Middleware to log request and response bodies in debug mode
///
/// Credentials and tokens are redacted before anything is written. Bodies are
/// only buffered when debug logging is enabled, and never for WebSocket
/// upgrades.
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(Level::DEBUG) || is_upgrade(request.headers()) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_LOGGED_BODY)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    if let Some(body) = printable_body(&bytes) {
        debug!(
            method = %parts.method,
            uri = %parts.uri.path(),
            request_body = %body,
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(body) = printable_body(&bytes) {
        debug!(
            status = %parts.status,
            response_body = %body,
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn is_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.eq_ignore_ascii_case("websocket"))
}

/// Pretty JSON with secrets masked; non-JSON bodies are summarised by size.
fn printable_body(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            redact_sensitive(&mut json);
            Some(serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string()))
        }
        Err(_) => Some(format!("<{} bytes, not JSON>", bytes.len())),
    }
}
