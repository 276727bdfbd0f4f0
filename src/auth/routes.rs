//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/register` - Password registration
/// - `POST /api/auth/login` - Password login
/// - `POST /api/auth/refresh` - Refresh token rotation
/// - `POST /api/auth/logout` - Revoke the stored refresh token
/// - `GET /api/auth/profile` - Current account
/// - `GET /api/auth/:provider` - Start Google/Facebook OAuth
/// - `GET /api/auth/:provider/callback` - OAuth callback
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/profile", get(handlers::profile_handler))
        .route("/api/auth/:provider", get(handlers::oauth_start_handler))
        .route(
            "/api/auth/:provider/callback",
            get(handlers::oauth_callback_handler),
        )
}
