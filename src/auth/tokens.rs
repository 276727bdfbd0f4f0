//! Signed access/refresh token issuance and verification

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{Claims, TokenPair};
use super::AuthError;
use crate::common::config::JwtConfig;
use crate::users::Account;

/// Issues and verifies HS256 tokens.
///
/// Access and refresh tokens are signed with different secrets so a leaked
/// access secret cannot mint refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    access_ttl: Duration,
    refresh_secret: String,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_secret: config.secret.clone(),
            access_ttl: config.expiration,
            refresh_secret: config.refresh_secret.clone(),
            refresh_ttl: config.refresh_expiration,
        }
    }

    /// Builds fresh claims for an account. Timing claims are filled in at
    /// signing time.
    pub fn claims_for(account: &Account) -> Claims {
        Claims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            jti: String::new(),
            iat: 0,
            exp: 0,
        }
    }

    pub fn issue_access(&self, claims: &Claims) -> Result<String, AuthError> {
        sign(claims, &self.access_secret, self.access_ttl)
    }

    pub fn issue_refresh(&self, claims: &Claims) -> Result<String, AuthError> {
        sign(claims, &self.refresh_secret, self.refresh_ttl)
    }

    pub fn issue_pair(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let claims = Self::claims_for(account);
        Ok(TokenPair {
            access_token: self.issue_access(&claims)?,
            refresh_token: self.issue_refresh(&claims)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        verify(token, &self.refresh_secret)
    }
}

fn sign(claims: &Claims, secret: &str, ttl: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        ..claims.clone()
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, account_id = claims.sub, "JWT encoding error");
        AuthError::TokenSigning(e.to_string())
    })
}

/// Verifies signature and expiry. Any failure is `InvalidToken`; no partial
/// decode is ever returned.
pub fn verify(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!(error = %e, "JWT validation failed");
        AuthError::InvalidToken
    })
}
