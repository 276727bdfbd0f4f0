// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::config::AppConfig;
use crate::auth::access::AccessTable;
use crate::auth::oauth::OAuthClient;
use crate::auth::password::PasswordHasher;
use crate::auth::tokens::TokenIssuer;
use crate::auth::AuthService;
use crate::notifications::NotificationGateway;
use crate::users::{CredentialStore, SqliteCredentialStore};

/// Application state containing the account store, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub hasher: PasswordHasher,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub oauth: OAuthClient,
    pub gateway: NotificationGateway,
    pub access: Arc<AccessTable>,
}

impl AppState {
    /// Wires the services from configuration over an open pool.
    pub fn build(db: SqlitePool, config: AppConfig, http: Client) -> Self {
        let store: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(db));
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        let tokens = TokenIssuer::new(&config.jwt);
        let auth = Arc::new(AuthService::new(store.clone(), hasher, tokens.clone()));
        let oauth = OAuthClient::new(http, &config);
        let gateway = NotificationGateway::new(tokens);

        Self {
            store,
            hasher,
            config,
            auth,
            oauth,
            gateway,
            access: Arc::new(AccessTable::standard()),
        }
    }
}
