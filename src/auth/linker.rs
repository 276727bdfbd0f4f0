//! Reconciles external OAuth profiles with local accounts

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::models::{OAuthProfile, OAuthProvider};
use super::AuthError;
use crate::common::safe_email_log;
use crate::users::{Account, CredentialStore, NewAccount, Role, StoreError};

/// Placeholder email for Facebook accounts that did not share one.
pub fn facebook_placeholder_email(facebook_id: &str) -> String {
    format!("facebook_{}@temp.com", facebook_id)
}

pub struct IdentityLinker {
    store: Arc<dyn CredentialStore>,
}

impl IdentityLinker {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolves a provider profile to an account.
    ///
    /// Order matters: a provider-id match wins over an email match, and an
    /// email match links the provider to that account instead of creating a
    /// second one.
    pub async fn link(
        &self,
        provider: OAuthProvider,
        profile: &OAuthProfile,
    ) -> Result<Account, AuthError> {
        self.resolve(provider, profile).await.map_err(|e| {
            error!(
                error = %e,
                provider = %provider,
                provider_id = %profile.provider_id,
                "Identity linking failed"
            );
            AuthError::OAuthAuthenticationFailed(provider)
        })
    }

    async fn resolve(
        &self,
        provider: OAuthProvider,
        profile: &OAuthProfile,
    ) -> Result<Account, LinkFailure> {
        if let Some(account) = self
            .store
            .find_by_provider_id(provider, &profile.provider_id)
            .await?
        {
            debug!(
                account_id = account.id,
                provider = %provider,
                "Matched existing account by provider id"
            );
            return Ok(account);
        }

        let email = match &profile.email {
            Some(email) => {
                if let Some(mut account) = self.store.find_by_email(email).await? {
                    set_provider_id(&mut account, provider, &profile.provider_id);
                    if let Some(avatar) = &profile.avatar {
                        account.avatar = Some(avatar.clone());
                    }
                    let linked = self.store.save(&account).await?;
                    info!(
                        account_id = linked.id,
                        email = %safe_email_log(&linked.email),
                        provider = %provider,
                        "Linked provider identity to existing account"
                    );
                    return Ok(linked);
                }
                email.clone()
            }
            None => match provider {
                OAuthProvider::Facebook => facebook_placeholder_email(&profile.provider_id),
                OAuthProvider::Google => {
                    warn!(provider_id = %profile.provider_id, "Google profile without email");
                    return Err(LinkFailure::MissingEmail);
                }
            },
        };

        let mut fields = NewAccount {
            email,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            avatar: profile.avatar.clone(),
            role: Role::User,
            ..Default::default()
        };
        match provider {
            OAuthProvider::Google => fields.google_id = Some(profile.provider_id.clone()),
            OAuthProvider::Facebook => fields.facebook_id = Some(profile.provider_id.clone()),
        }

        let account = self.store.create(fields).await?;
        info!(
            account_id = account.id,
            email = %safe_email_log(&account.email),
            provider = %provider,
            "Created account from provider identity"
        );
        Ok(account)
    }
}

fn set_provider_id(account: &mut Account, provider: OAuthProvider, provider_id: &str) {
    match provider {
        OAuthProvider::Google => account.google_id = Some(provider_id.to_string()),
        OAuthProvider::Facebook => account.facebook_id = Some(provider_id.to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
enum LinkFailure {
    #[error("profile carries no email")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}
