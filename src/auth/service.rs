//! Auth orchestration: register, login, refresh, OAuth login, logout

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::linker::IdentityLinker;
use super::models::{OAuthIdentity, OAuthProvider, TokenPair};
use super::password::PasswordHasher;
use super::tokens::TokenIssuer;
use crate::common::safe_email_log;
use crate::users::{Account, CredentialStore, NewAccount, Role, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User with this email already exists")]
    DuplicateAccount,

    /// Same message for unknown email, password-less account and wrong
    /// password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("Invalid token")]
    InvalidToken,

    /// Same message for bad signature, expiry, unknown or inactive account,
    /// and a token that is no longer the stored one.
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Failed to authenticate with {}", .0.display_name())]
    OAuthAuthenticationFailed(OAuthProvider),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(String),
}

/// Plaintext behind the stand-in digest used when an account has no
/// password to check.
const DUMMY_PASSWORD: &str = "storefront-login-placeholder";

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    linker: IdentityLinker,
    /// Hashed at the configured cost. Every password login runs exactly one
    /// bcrypt verification, whether or not the account exists.
    dummy_digest: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        let linker = IdentityLinker::new(store.clone());
        let dummy_digest = hasher.hash(DUMMY_PASSWORD).unwrap_or_else(|e| {
            warn!(error = %e, "Could not prepare placeholder digest");
            String::new()
        });
        Self {
            store,
            hasher,
            tokens,
            linker,
            dummy_digest,
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        if self.store.find_by_email(email).await?.is_some() {
            warn!(email = %safe_email_log(email), "Registration rejected: email already in use");
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash_blocking(password).await?;

        let account = self
            .store
            .create(NewAccount {
                email: email.to_string(),
                password_hash: Some(password_hash),
                first_name,
                last_name,
                role: Role::User,
                ..Default::default()
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration of the same email.
                StoreError::UniqueViolation => AuthError::DuplicateAccount,
                other => AuthError::Store(other),
            })?;

        info!(
            account_id = account.id,
            email = %safe_email_log(&account.email),
            "Account registered"
        );

        self.issue_tokens(&account).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let found = self.store.find_by_email(email).await?;
        let digest = found
            .as_ref()
            .and_then(|account| account.password_hash.as_deref())
            .unwrap_or(self.dummy_digest.as_str());
        let verified = self.hasher.verify_blocking(password, digest).await;

        let account = match found {
            Some(account) if account.password_hash.is_some() => account,
            Some(account) => {
                debug!(account_id = account.id, "Login failed: account has no password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                debug!(email = %safe_email_log(email), "Login failed: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verified {
            debug!(account_id = account.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            warn!(account_id = account.id, "Login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        info!(
            account_id = account.id,
            email = %safe_email_log(&account.email),
            "Password login successful"
        );

        self.issue_tokens(&account).await
    }

    /// Rotates a refresh token. Only the most recently issued refresh token
    /// is accepted; concurrent refreshes race and the last write wins.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let account = match self.store.find_by_id(claims.sub).await? {
            Some(account) => account,
            None => {
                debug!(account_id = claims.sub, "Refresh rejected: account not found");
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        if !account.is_active {
            debug!(account_id = account.id, "Refresh rejected: account disabled");
            return Err(AuthError::InvalidRefreshToken);
        }

        let matches_stored = account
            .refresh_token
            .as_deref()
            .map_or(false, |stored| constant_time_eq(stored, refresh_token));
        if !matches_stored {
            warn!(account_id = account.id, "Refresh rejected: token superseded or revoked");
            return Err(AuthError::InvalidRefreshToken);
        }

        debug!(account_id = account.id, "Refresh token accepted, rotating");
        self.issue_tokens(&account).await
    }

    pub async fn oauth_login(
        &self,
        provider: OAuthProvider,
        identity: OAuthIdentity,
    ) -> Result<TokenPair, AuthError> {
        let account = match identity {
            OAuthIdentity::ResolvedAccount(account) => account,
            OAuthIdentity::RawProfile(profile) => self.linker.link(provider, &profile).await?,
        };

        if !account.is_active {
            warn!(account_id = account.id, provider = %provider, "OAuth login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        info!(
            account_id = account.id,
            email = %safe_email_log(&account.email),
            provider = %provider,
            "OAuth login successful"
        );

        self.issue_tokens(&account).await
    }

    /// Clears the stored refresh token. Calling it again is a no-op.
    pub async fn logout(&self, account_id: i64) -> Result<(), AuthError> {
        self.store.update_refresh_token(account_id, None).await?;
        info!(account_id = account_id, "Account logged out");
        Ok(())
    }

    /// Resolves a bearer access token to its active account.
    pub async fn authenticate(&self, access_token: &str) -> Result<Account, AuthError> {
        let claims = self.tokens.verify_access(access_token)?;

        let account = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(account)
    }

    /// Single issuance path: after it succeeds the stored refresh token is
    /// the one just returned.
    async fn issue_tokens(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let pair = self.tokens.issue_pair(account)?;
        self.store
            .update_refresh_token(account.id, Some(&pair.refresh_token))
            .await?;
        Ok(pair)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
