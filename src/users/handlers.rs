//! Account management handlers
//!
//! Which roles may call each route is decided by the access table; these
//! handlers only see requests that already passed it.

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::models::{
    Account, AccountFilter, AccountPage, CreateAccountRequest, ListAccountsQuery, NewAccount,
    UpdateAccountRequest,
};
use super::store::StoreError;
use super::validators::{CreateAccountValidator, ListAccountsValidator, UpdateAccountValidator};
use crate::auth::extractors::AuthedUser;
use crate::common::{safe_email_log, ApiError, AppState, Validator};

/// POST /api/users
/// Creates an account on behalf of an admin
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "password": "secret1", "firstName": "Ada", "role": "user" }
/// ```
pub async fn create_account(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    CreateAccountValidator.validate(&payload).into_result()?;
    let state = state_lock.read().await.clone();

    info!(
        admin_id = authed.id(),
        email = %safe_email_log(&payload.email),
        role = %payload.role,
        "Creating account"
    );

    let password_hash = match payload.password.as_deref() {
        Some(password) => Some(state.hasher.hash_blocking(password).await?),
        None => None,
    };

    let account = state
        .store
        .create(NewAccount {
            email: payload.email,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
            role: payload.role,
            avatar: payload.avatar,
            ..Default::default()
        })
        .await
        .map_err(duplicate_email)?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/users?search=&role=&page=&limit=&sortBy=&sortOrder=
/// Paginated account listing
///
/// # Response
/// ```json
/// { "data": [...], "total": 42, "page": 1, "limit": 10, "totalPages": 5 }
/// ```
pub async fn list_accounts(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<AccountPage>, ApiError> {
    ListAccountsValidator.validate(&query).into_result()?;
    let filter = AccountFilter::from(&query);
    let state = state_lock.read().await.clone();

    let page = state.store.list(&filter).await?;
    debug!(total = page.total, page = page.page, "Account list served");

    Ok(Json(page))
}

/// GET /api/users/:id
pub async fn get_account(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, ApiError> {
    let state = state_lock.read().await.clone();

    match state.store.find_by_id(id).await? {
        Some(account) => Ok(Json(account)),
        None => Err(not_found(id)),
    }
}

/// PATCH /api/users/:id
/// Applies the fields present in the body
pub async fn update_account(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    UpdateAccountValidator.validate(&payload).into_result()?;
    let state = state_lock.read().await.clone();

    let mut account = state.store.find_by_id(id).await?.ok_or_else(|| not_found(id))?;

    if let Some(email) = payload.email {
        account.email = email;
    }
    if let Some(password) = payload.password.as_deref() {
        account.password_hash = Some(state.hasher.hash_blocking(password).await?);
    }
    if let Some(first_name) = payload.first_name {
        account.first_name = Some(first_name);
    }
    if let Some(last_name) = payload.last_name {
        account.last_name = Some(last_name);
    }
    if let Some(role) = payload.role {
        account.role = role;
    }
    if let Some(avatar) = payload.avatar {
        account.avatar = Some(avatar);
    }
    if let Some(is_active) = payload.is_active {
        account.is_active = is_active;
    }

    let saved = state.store.save(&account).await.map_err(duplicate_email)?;

    info!(
        admin_id = authed.id(),
        account_id = saved.id,
        role = %saved.role,
        is_active = saved.is_active,
        "Account updated"
    );

    Ok(Json(saved))
}

/// DELETE /api/users/:id
/// Soft delete; the account disappears from every lookup and its refresh
/// token is revoked.
pub async fn delete_account(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let state = state_lock.read().await.clone();

    state.store.soft_delete(id).await.map_err(|e| match e {
        StoreError::NotFound => not_found(id),
        other => ApiError::from(other),
    })?;

    info!(admin_id = authed.id(), account_id = id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(id: i64) -> ApiError {
    warn!(account_id = id, "Account not found");
    ApiError::NotFound(format!("User with ID {} not found", id))
}

fn duplicate_email(err: StoreError) -> ApiError {
    match err {
        StoreError::UniqueViolation => {
            ApiError::Conflict("User with this email already exists".to_string())
        }
        other => ApiError::from(other),
    }
}
