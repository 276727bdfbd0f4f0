//! Route capability table and the middleware that enforces it
//!
//! Which routes are public, which need a signed-in account and which need a
//! particular role is declared here in one table instead of on each
//! handler. Routes that match no rule require authentication.

use axum::{
    extract::{Extension, Request},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::extractors::{bearer_token, AuthedUser};
use crate::common::{ApiError, AppState};
use crate::users::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    /// `None` matches every method
    pub method: Option<Method>,
    /// Exact path, or `prefix/*` for the prefix and everything under it
    pub pattern: &'static str,
    pub capability: Capability,
}

impl RouteRule {
    pub fn new(method: Option<Method>, pattern: &'static str, capability: Capability) -> Self {
        Self {
            method,
            pattern,
            capability,
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        if let Some(expected) = &self.method {
            if expected != method {
                return false;
            }
        }

        match self.pattern.strip_suffix("/*") {
            Some(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix)
                        .map_or(false, |rest| rest.starts_with('/'))
            }
            None => path == self.pattern,
        }
    }
}

/// Ordered rules; the first match wins.
#[derive(Debug, Clone)]
pub struct AccessTable {
    rules: Vec<RouteRule>,
    fallback: Capability,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl AccessTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            fallback: Capability::Authenticated,
        }
    }

    /// Capabilities for every route this service mounts
    pub fn standard() -> Self {
        use Capability::*;

        Self::new(vec![
            RouteRule::new(Some(Method::GET), "/health", Public),
            RouteRule::new(Some(Method::POST), "/api/auth/register", Public),
            RouteRule::new(Some(Method::POST), "/api/auth/login", Public),
            RouteRule::new(Some(Method::POST), "/api/auth/refresh", Public),
            RouteRule::new(Some(Method::POST), "/api/auth/logout", Authenticated),
            RouteRule::new(Some(Method::GET), "/api/auth/profile", Authenticated),
            RouteRule::new(Some(Method::GET), "/api/auth/google/*", Public),
            RouteRule::new(Some(Method::GET), "/api/auth/facebook/*", Public),
            // The gateway authenticates its own handshake.
            RouteRule::new(Some(Method::GET), "/ws", Public),
            RouteRule::new(None, "/api/notifications/*", Roles(ADMIN_ONLY)),
            RouteRule::new(Some(Method::POST), "/api/users", Roles(ADMIN_ONLY)),
            RouteRule::new(Some(Method::PATCH), "/api/users/*", Roles(ADMIN_ONLY)),
            RouteRule::new(Some(Method::DELETE), "/api/users/*", Roles(ADMIN_ONLY)),
            RouteRule::new(Some(Method::GET), "/api/users/*", Authenticated),
        ])
    }

    pub fn capability_for(&self, method: &Method, path: &str) -> Capability {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.capability)
            .unwrap_or(self.fallback)
    }
}

/// Enforces the capability table. On success the resolved account is
/// attached to the request for the [`AuthedUser`] extractor.
pub async fn enforce_access(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();
    let capability = state
        .access
        .capability_for(request.method(), request.uri().path());

    if capability == Capability::Public {
        return Ok(next.run(request).await);
    }

    let token = match bearer_token(request.headers()) {
        Some(token) => token,
        None => {
            warn!(path = %request.uri().path(), "Authentication failed: missing Authorization header");
            return Err(ApiError::Unauthorized("missing auth".into()));
        }
    };

    let account = state.auth.authenticate(&token).await.map_err(|e| {
        warn!(error = %e, path = %request.uri().path(), "Authentication failed");
        ApiError::from(e)
    })?;

    if let Capability::Roles(roles) = capability {
        if !roles.contains(&account.role) {
            warn!(
                account_id = account.id,
                role = %account.role,
                path = %request.uri().path(),
                "Authorization failed: role not permitted"
            );
            return Err(ApiError::Forbidden("insufficient role".into()));
        }
    }

    debug!(account_id = account.id, path = %request.uri().path(), "Request authenticated");
    request.extensions_mut().insert(AuthedUser { account });

    Ok(next.run(request).await)
}
