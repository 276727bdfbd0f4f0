//! Authentication handlers

use axum::{
    extract::{Extension, Json, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::extractors::AuthedUser;
use super::models::{
    LoginRequest, OAuthCallbackParams, OAuthIdentity, OAuthProvider, RefreshTokenRequest,
    RegisterRequest, TokenPair,
};
use super::oauth::{cookie_value, OAuthClient, OAuthError, OAUTH_STATE_COOKIE};
use super::validators::{LoginValidator, RefreshTokenValidator, RegisterValidator};
use crate::common::{safe_email_log, ApiError, AppState, Validator};
use crate::users::Account;

/// POST /api/auth/register
/// Creates a password account and signs it in
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "password": "secret1", "firstName": "Ada", "lastName": "L" }
/// ```
///
/// # Response (201)
/// ```json
/// { "accessToken": "<jwt>", "refreshToken": "<jwt>" }
/// ```
pub async fn register_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError> {
    RegisterValidator.validate(&payload).into_result()?;
    let state = state_lock.read().await.clone();

    info!(email = %safe_email_log(&payload.email), "🔐 Received registration request");

    let tokens = state
        .auth
        .register(
            &payload.email,
            &payload.password,
            payload.first_name,
            payload.last_name,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /api/auth/login
/// Password login
///
/// # Response
/// ```json
/// { "accessToken": "<jwt>", "refreshToken": "<jwt>" }
/// ```
pub async fn login_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    LoginValidator.validate(&payload).into_result()?;
    let state = state_lock.read().await.clone();

    let tokens = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/refresh
/// Exchanges the current refresh token for a new pair
///
/// # Request Body
/// ```json
/// { "refreshToken": "<jwt>" }
/// ```
pub async fn refresh_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    RefreshTokenValidator.validate(&payload).into_result()?;
    let state = state_lock.read().await.clone();

    let tokens = state.auth.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout
/// Revokes the stored refresh token; the access token stays valid until it
/// expires.
pub async fn logout_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<StatusCode, ApiError> {
    let state = state_lock.read().await.clone();
    state.auth.logout(authed.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/profile
/// Returns the current account
pub async fn profile_handler(authed: AuthedUser) -> Json<Account> {
    Json(authed.account)
}

/// GET /api/auth/:provider
/// Redirects the browser to the provider's consent page
pub async fn oauth_start_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = parse_provider(&provider)?;
    let state = state_lock.read().await.clone();

    let oauth_state = OAuthClient::generate_state();
    let auth_url = state.oauth.authorization_url(provider, &oauth_state)?;

    info!(provider = %provider, "Starting OAuth flow");

    let cookie = format!(
        "{}={}; Path=/api/auth; HttpOnly; SameSite=Lax; Max-Age=600",
        OAUTH_STATE_COOKIE, oauth_state
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&auth_url)))
}

/// GET /api/auth/:provider/callback
/// Completes the OAuth flow and hands the tokens to the frontend
pub async fn oauth_callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let provider = parse_provider(&provider)?;
    let state = state_lock.read().await.clone();

    if let Some(error) = params.error {
        warn!(provider = %provider, oauth_error = %error, "Provider returned OAuth error");
        return Err(ApiError::Unauthorized(format!(
            "{} authorization failed",
            provider.display_name()
        )));
    }

    let expected_state = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, OAUTH_STATE_COOKIE));
    if expected_state.is_none() || expected_state != params.state.as_deref() {
        warn!(provider = %provider, "OAuth callback state mismatch");
        return Err(OAuthError::StateMismatch.into());
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("No authorization code provided".to_string()))?;

    let profile = state.oauth.complete(provider, &code).await?;
    let tokens = state
        .auth
        .oauth_login(provider, OAuthIdentity::RawProfile(profile))
        .await?;

    let redirect_url = format!(
        "{}/auth/callback?token={}&refreshToken={}",
        state.config.frontend_url.trim_end_matches('/'),
        urlencoding::encode(&tokens.access_token),
        urlencoding::encode(&tokens.refresh_token)
    );
    let clear_cookie = format!(
        "{}=; Path=/api/auth; HttpOnly; SameSite=Lax; Max-Age=0",
        OAUTH_STATE_COOKIE
    );

    Ok(([(header::SET_COOKIE, clear_cookie)], Redirect::to(&redirect_url)))
}

fn parse_provider(raw: &str) -> Result<OAuthProvider, ApiError> {
    raw.parse::<OAuthProvider>()
        .map_err(|_| ApiError::NotFound(format!("unknown provider: {}", raw)))
}
