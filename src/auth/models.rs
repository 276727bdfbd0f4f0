//! Authentication data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::users::{Account, Role};

/// JWT claims structure
///
/// Access and refresh tokens carry the same shape; only the signing secret
/// and lifetime differ. `jti` makes every issued token unique.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Access/refresh token pair returned by every successful authentication
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// External identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    /// Human-readable name used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Facebook => "Facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(format!("unsupported provider: {}", other)),
        }
    }
}

/// Profile returned by an identity provider after a successful OAuth exchange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

/// What the OAuth boundary hands to the auth core: either a raw provider
/// profile that still needs linking, or an account already resolved by the
/// caller.
#[derive(Debug, Clone)]
pub enum OAuthIdentity {
    RawProfile(OAuthProfile),
    ResolvedAccount(Account),
}

/// POST /api/auth/register body
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// POST /api/auth/login body
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/refresh body
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Query string on the provider callback
#[derive(Deserialize, Debug)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
