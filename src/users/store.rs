//! Credential store: account persistence behind an async trait

use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error, info};

use super::models::{Account, AccountFilter, AccountPage, NewAccount};
use crate::auth::models::OAuthProvider;
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Account already exists")]
    UniqueViolation,

    #[error("Account not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            sqlx::Error::RowNotFound => StoreError::NotFound,
            _ => StoreError::Database(err),
        }
    }
}

/// Lookup/insert/update contract the auth core needs from account storage.
///
/// Soft-deleted accounts are invisible to every lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError>;

    async fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn create(&self, fields: NewAccount) -> Result<Account, StoreError>;

    /// Persists profile and link fields. Does not touch the refresh token.
    async fn save(&self, account: &Account) -> Result<Account, StoreError>;

    async fn update_refresh_token(&self, id: i64, token: Option<&str>) -> Result<(), StoreError>;

    async fn soft_delete(&self, id: i64) -> Result<(), StoreError>;

    /// One page of live accounts matching the filter, with the total count.
    async fn list(&self, filter: &AccountFilter) -> Result<AccountPage, StoreError>;
}

/// SQLite-backed credential store
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE email = ? AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, email = %safe_email_log(email), "Database error looking up account by email");
            StoreError::from(e)
        })?;

        Ok(account)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM users WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, account_id = id, "Database error looking up account by id");
            StoreError::from(e)
        })?;

        Ok(account)
    }

    async fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let sql = match provider {
            OAuthProvider::Google => {
                "SELECT * FROM users WHERE google_id = ? AND deleted_at IS NULL"
            }
            OAuthProvider::Facebook => {
                "SELECT * FROM users WHERE facebook_id = ? AND deleted_at IS NULL"
            }
        };

        let account = sqlx::query_as::<_, Account>(sql)
            .bind(provider_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    provider = %provider,
                    provider_id = %provider_id,
                    "Database error looking up account by provider id"
                );
                StoreError::from(e)
            })?;

        Ok(account)
    }

    async fn create(&self, fields: NewAccount) -> Result<Account, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, google_id, facebook_id, avatar)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.email)
        .bind(fields.password_hash.as_deref())
        .bind(fields.first_name.as_deref())
        .bind(fields.last_name.as_deref())
        .bind(fields.role)
        .bind(fields.google_id.as_deref())
        .bind(fields.facebook_id.as_deref())
        .bind(fields.avatar.as_deref())
        .execute(&self.db)
        .await
        .map_err(StoreError::from)?;

        let id = result.last_insert_rowid();
        info!(
            account_id = id,
            email = %safe_email_log(&fields.email),
            role = %fields.role,
            "Account created"
        );

        self.find_by_id(id).await?.ok_or(StoreError::NotFound)
    }

    async fn save(&self, account: &Account) -> Result<Account, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = ?,
                password_hash = ?,
                first_name = ?,
                last_name = ?,
                role = ?,
                google_id = ?,
                facebook_id = ?,
                avatar = ?,
                is_active = ?,
                updated_at = datetime('now')
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&account.email)
        .bind(account.password_hash.as_deref())
        .bind(account.first_name.as_deref())
        .bind(account.last_name.as_deref())
        .bind(account.role)
        .bind(account.google_id.as_deref())
        .bind(account.facebook_id.as_deref())
        .bind(account.avatar.as_deref())
        .bind(account.is_active)
        .bind(account.id)
        .execute(&self.db)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        debug!(account_id = account.id, "Account saved");
        self.find_by_id(account.id).await?.ok_or(StoreError::NotFound)
    }

    async fn update_refresh_token(&self, id: i64, token: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET refresh_token = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(token)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!(error = %e, account_id = id, "Database error updating refresh token");
            StoreError::from(e)
        })?;

        debug!(account_id = id, cleared = token.is_none(), "Refresh token updated");
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET deleted_at = datetime('now'), refresh_token = NULL
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        info!(account_id = id, "Account soft-deleted");
        Ok(())
    }

    async fn list(&self, filter: &AccountFilter) -> Result<AccountPage, StoreError> {
        let pattern = filter.search.as_ref().map(|term| format!("%{}%", term));

        let mut conditions = String::from("deleted_at IS NULL");
        if pattern.is_some() {
            conditions.push_str(" AND (email LIKE ? OR first_name LIKE ? OR last_name LIKE ?)");
        }
        if filter.role.is_some() {
            conditions.push_str(" AND role = ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {}", conditions);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(pattern) = pattern.as_deref() {
            count_query = count_query.bind(pattern).bind(pattern).bind(pattern);
        }
        if let Some(role) = filter.role {
            count_query = count_query.bind(role);
        }
        let total = count_query.fetch_one(&self.db).await.map_err(|e| {
            error!(error = %e, "Database error counting accounts");
            StoreError::from(e)
        })?;

        // Sort column and direction come from closed enums, never from input.
        let direction = filter.sort_order.as_sql();
        let list_sql = format!(
            "SELECT * FROM users WHERE {} ORDER BY {} {}, id {} LIMIT ? OFFSET ?",
            conditions,
            filter.sort_by.column(),
            direction,
            direction
        );
        let mut list_query = sqlx::query_as::<_, Account>(&list_sql);
        if let Some(pattern) = pattern.as_deref() {
            list_query = list_query.bind(pattern).bind(pattern).bind(pattern);
        }
        if let Some(role) = filter.role {
            list_query = list_query.bind(role);
        }
        let accounts = list_query
            .bind(i64::from(filter.limit))
            .bind(filter.offset())
            .fetch_all(&self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Database error listing accounts");
                StoreError::from(e)
            })?;

        debug!(
            total = total,
            returned = accounts.len(),
            page = filter.page,
            limit = filter.limit,
            "Accounts listed"
        );

        Ok(AccountPage::new(accounts, total, filter))
    }
}
