//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::common::ApiError;
use crate::users::Account;

/// Authenticated account extractor
///
/// The account is attached by the access middleware after the bearer token
/// has been verified; this extractor only reads it back.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub account: Account,
}

impl AuthedUser {
    pub fn id(&self) -> i64 {
        self.account.id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthedUser>() {
            Some(user) => Ok(user.clone()),
            None => {
                warn!(path = %parts.uri.path(), "AuthedUser requested on a route without authentication");
                Err(ApiError::Unauthorized("missing auth".into()))
            }
        }
    }
}

/// Extracts the token from `Authorization`, accepting `Bearer <token>` or a
/// raw token.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
