//! Shared fixtures for unit tests

use chrono::Duration;
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::config::{AppConfig, JwtConfig};
use super::migrations::run_migrations;
use super::state::AppState;
use crate::auth::models::Claims;
use crate::auth::tokens::TokenIssuer;
use crate::users::Role;

/// In-memory database with the full schema. A single connection keeps every
/// query on the same memory database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-access-secret".to_string(),
        expiration: Duration::minutes(15),
        refresh_secret: "test-refresh-secret".to_string(),
        refresh_expiration: Duration::days(7),
    }
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(&test_jwt_config())
}

/// Claims for a token that was never persisted; enough for the gateway,
/// which does not consult the store.
pub fn claims_for(id: i64, email: &str, role: Role) -> Claims {
    Claims {
        sub: id,
        email: email.to_string(),
        role,
        jti: String::new(),
        iat: 0,
        exp: 0,
    }
}

/// Configuration whose JWT secrets match [`test_jwt_config`], with the
/// cheapest bcrypt cost and Google configured.
pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| {
        let value = match key {
            "DATABASE_URL" => "sqlite::memory:",
            "JWT_SECRET" => "test-access-secret",
            "JWT_REFRESH_SECRET" => "test-refresh-secret",
            "BCRYPT_COST" => "4",
            "FRONTEND_URL" => "http://localhost:3000",
            "GOOGLE_CLIENT_ID" => "google-client",
            "GOOGLE_CLIENT_SECRET" => "google-secret",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

pub async fn test_state() -> AppState {
    AppState::build(memory_pool().await, test_config(), Client::new())
}
