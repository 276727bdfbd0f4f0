// src/auth/oauth.rs
//! Google and Facebook OAuth 2.0 authorization-code flow
//!
//! Builds the provider consent URL, exchanges the callback code for a
//! provider access token and maps the provider's profile into an
//! [`OAuthProfile`]. Account reconciliation happens in the identity linker.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::models::{OAuthProfile, OAuthProvider};
use crate::common::config::{AppConfig, OAuthProviderConfig};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const FACEBOOK_PROFILE_URL: &str = "https://graph.facebook.com/v18.0/me";

/// Cookie carrying the anti-forgery `state` between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0} OAuth not configured")]
    NotConfigured(OAuthProvider),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Invalid provider profile: {0}")]
    InvalidProfile(String),
}

#[derive(Debug, Deserialize)]
struct ProviderTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

impl From<GoogleUserInfo> for OAuthProfile {
    fn from(info: GoogleUserInfo) -> Self {
        OAuthProfile {
            provider_id: info.sub,
            email: info.email.filter(|e| !e.is_empty()),
            first_name: info.given_name,
            last_name: info.family_name,
            avatar: info.picture.filter(|p| !p.is_empty()),
        }
    }
}

impl From<FacebookUser> for OAuthProfile {
    fn from(user: FacebookUser) -> Self {
        OAuthProfile {
            provider_id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.picture.and_then(|p| p.data.url),
        }
    }
}

/// OAuth client for the configured providers
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    google: Option<OAuthProviderConfig>,
    facebook: Option<OAuthProviderConfig>,
}

impl OAuthClient {
    pub fn new(http: Client, config: &AppConfig) -> Self {
        Self {
            http,
            google: config.google.clone(),
            facebook: config.facebook.clone(),
        }
    }

    fn provider_config(&self, provider: OAuthProvider) -> Result<&OAuthProviderConfig, OAuthError> {
        let config = match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Facebook => self.facebook.as_ref(),
        };
        config.ok_or(OAuthError::NotConfigured(provider))
    }

    /// Random value bound to the browser via cookie and echoed back by the
    /// provider.
    pub fn generate_state() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    /// Consent-page URL the browser is redirected to
    pub fn authorization_url(&self, provider: OAuthProvider, state: &str) -> Result<String, OAuthError> {
        let config = self.provider_config(provider)?;

        let (base, scope) = match provider {
            OAuthProvider::Google => (GOOGLE_AUTH_URL, "email profile"),
            OAuthProvider::Facebook => (FACEBOOK_AUTH_URL, "email"),
        };

        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            base,
            urlencoding::encode(&config.client_id),
            urlencoding::encode(&config.callback_url),
            urlencoding::encode(scope),
            urlencoding::encode(state)
        );

        debug!(provider = %provider, "Generated OAuth authorization URL");
        Ok(url)
    }

    /// Exchanges the callback code and fetches the provider profile.
    pub async fn complete(&self, provider: OAuthProvider, code: &str) -> Result<OAuthProfile, OAuthError> {
        let access_token = self.exchange_code(provider, code).await?;
        let profile = self.fetch_profile(provider, &access_token).await?;
        info!(provider = %provider, provider_id = %profile.provider_id, "Fetched OAuth profile");
        Ok(profile)
    }

    /// Exchange authorization code for a provider access token
    pub async fn exchange_code(&self, provider: OAuthProvider, code: &str) -> Result<String, OAuthError> {
        let config = self.provider_config(provider)?;

        let params = [
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %provider, "Exchanging authorization code for tokens");

        let request = match provider {
            OAuthProvider::Google => self.http.post(GOOGLE_TOKEN_URL).form(&params),
            OAuthProvider::Facebook => self.http.get(FACEBOOK_TOKEN_URL).query(&params),
        };

        let response = request
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = %provider, status = %status, error = %error_text, "Token exchange failed");
            return Err(OAuthError::ExchangeFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token = response
            .json::<ProviderTokenResponse>()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

        Ok(token.access_token)
    }

    /// Fetch the signed-in user's profile from the provider
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<OAuthProfile, OAuthError> {
        let request = match provider {
            OAuthProvider::Google => self.http.get(GOOGLE_USERINFO_URL).bearer_auth(access_token),
            OAuthProvider::Facebook => self.http.get(FACEBOOK_PROFILE_URL).query(&[
                ("fields", "id,email,first_name,last_name,picture.type(large)"),
                ("access_token", access_token),
            ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::RequestFailed(format!(
                "profile request returned {}",
                response.status()
            )));
        }

        let profile: OAuthProfile = match provider {
            OAuthProvider::Google => response
                .json::<GoogleUserInfo>()
                .await
                .map_err(|e| OAuthError::InvalidProfile(e.to_string()))?
                .into(),
            OAuthProvider::Facebook => response
                .json::<FacebookUser>()
                .await
                .map_err(|e| OAuthError::InvalidProfile(e.to_string()))?
                .into(),
        };

        if profile.provider_id.is_empty() {
            return Err(OAuthError::InvalidProfile("empty provider id".to_string()));
        }

        Ok(profile)
    }
}

/// Reads a cookie value from a raw `Cookie` header.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::AppConfig;

    fn client_with_google() -> OAuthClient {
        let config = AppConfig::from_lookup(|key| match key {
            "GOOGLE_CLIENT_ID" => Some("test_client_id".to_string()),
            "GOOGLE_CLIENT_SECRET" => Some("test_secret".to_string()),
            _ => None,
        })
        .unwrap();
        OAuthClient::new(Client::new(), &config)
    }

    #[test]
    fn test_google_authorization_url() {
        let url = client_with_google()
            .authorization_url(OAuthProvider::Google, "abc123")
            .unwrap();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=email%20profile"));
        assert!(url.contains("state=abc123"));
    }

    #[test]
    fn test_unconfigured_provider() {
        let err = client_with_google()
            .authorization_url(OAuthProvider::Facebook, "abc123")
            .unwrap_err();
        assert!(matches!(err, OAuthError::NotConfigured(OAuthProvider::Facebook)));
    }

    #[test]
    fn test_generate_state_is_random() {
        let a = OAuthClient::generate_state();
        let b = OAuthClient::generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_profile_mapping() {
        let google: GoogleUserInfo = serde_json::from_value(serde_json::json!({
            "sub": "G1",
            "email": "e@x.com",
            "given_name": "Eve",
            "family_name": "X",
            "picture": ""
        }))
        .unwrap();
        let profile = OAuthProfile::from(google);
        assert_eq!(profile.provider_id, "G1");
        assert_eq!(profile.email.as_deref(), Some("e@x.com"));
        assert!(profile.avatar.is_none());

        let facebook: FacebookUser = serde_json::from_value(serde_json::json!({
            "id": "F1",
            "first_name": "Fay",
            "picture": { "data": { "url": "https://fb.example/p.jpg" } }
        }))
        .unwrap();
        let profile = OAuthProfile::from(facebook);
        assert_eq!(profile.provider_id, "F1");
        assert!(profile.email.is_none());
        assert_eq!(profile.avatar.as_deref(), Some("https://fb.example/p.jpg"));
    }

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; oauth_state=xyz; other=1";
        assert_eq!(cookie_value(header, OAUTH_STATE_COOKIE), Some("xyz"));
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
