// src/common/config.rs
//! Environment-driven configuration
//!
//! Every setting is read once at startup. Values come from the process
//! environment (after `.env` is loaded by `dotenv`).

use chrono::Duration;
use std::env;
use thiserror::Error;
use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "replace_with_strong_access_secret";
const DEFAULT_JWT_REFRESH_SECRET: &str = "replace_with_strong_refresh_secret";

/// Work factor used when `BCRYPT_COST` is not set.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid duration for {key}: {value:?}")]
    InvalidDuration { key: &'static str, value: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Signing secrets and lifetimes for the two token kinds
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration: Duration,
    pub refresh_secret: String,
    pub refresh_expiration: Duration,
}

/// Client credentials for one OAuth provider
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub google: Option<OAuthProviderConfig>,
    pub facebook: Option<OAuthProviderConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://storefront.db".to_string());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?,
            None => 8080,
        };

        let secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using development default");
            DEFAULT_JWT_SECRET.to_string()
        });
        let refresh_secret = get("JWT_REFRESH_SECRET").unwrap_or_else(|| {
            warn!("JWT_REFRESH_SECRET not set, using development default");
            DEFAULT_JWT_REFRESH_SECRET.to_string()
        });
        if secret == refresh_secret {
            warn!("JWT_SECRET and JWT_REFRESH_SECRET are identical; access tokens could be replayed as refresh tokens");
        }

        let expiration = duration_setting(&get, "JWT_EXPIRATION", "15m")?;
        let refresh_expiration = duration_setting(&get, "JWT_REFRESH_EXPIRATION", "7d")?;

        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|cost| (4..=31).contains(cost))
                .ok_or(ConfigError::InvalidValue {
                    key: "BCRYPT_COST",
                    value: raw,
                })?,
            None => DEFAULT_BCRYPT_COST,
        };

        let frontend_url =
            get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string());

        let raw_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string());
        let cors_origins: Vec<String> = raw_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        // Credentialed CORS cannot answer with a wildcard origin.
        if cors_origins.iter().any(|origin| origin == "*") {
            return Err(ConfigError::InvalidValue {
                key: "CORS_ORIGINS",
                value: raw_origins,
            });
        }

        let google = provider_setting(
            &get,
            ("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET", "GOOGLE_CALLBACK_URL"),
            "http://localhost:8080/api/auth/google/callback",
        );
        let facebook = provider_setting(
            &get,
            ("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET", "FACEBOOK_CALLBACK_URL"),
            "http://localhost:8080/api/auth/facebook/callback",
        );

        Ok(Self {
            database_url,
            port,
            jwt: JwtConfig {
                secret,
                expiration,
                refresh_secret,
                refresh_expiration,
            },
            bcrypt_cost,
            frontend_url,
            cors_origins,
            google,
            facebook,
        })
    }
}

fn duration_setting<F>(get: &F, key: &'static str, default: &str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    parse_duration(&raw).ok_or(ConfigError::InvalidDuration { key, value: raw })
}

fn provider_setting<F>(
    get: &F,
    (id_key, secret_key, callback_key): (&str, &str, &str),
    default_callback: &str,
) -> Option<OAuthProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = get(id_key)?;
    let client_secret = get(secret_key)?;
    let callback_url = get(callback_key).unwrap_or_else(|| default_callback.to_string());

    Some(OAuthProviderConfig {
        client_id,
        client_secret,
        callback_url,
    })
}

/// Parses `"900"`, `"30s"`, `"15m"`, `"12h"` or `"7d"` into a positive duration.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount = digits.parse::<i64>().ok().filter(|n| *n > 0)?;

    match unit {
        "" | "s" => Some(Duration::seconds(amount)),
        "m" => Some(Duration::minutes(amount)),
        "h" => Some(Duration::hours(amount)),
        "d" => Some(Duration::days(amount)),
        _ => None,
    }
}
