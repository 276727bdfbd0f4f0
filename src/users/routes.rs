//! Account management routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the account management router
///
/// # Routes
/// - `POST /api/users` - Create an account (admin)
/// - `GET /api/users` - Paginated, filterable listing
/// - `GET /api/users/:id` - One account
/// - `PATCH /api/users/:id` - Partial update (admin)
/// - `DELETE /api/users/:id` - Soft delete (admin)
pub fn users_routes() -> Router {
    Router::new()
        .route(
            "/api/users",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route(
            "/api/users/:id",
            get(handlers::get_account)
                .patch(handlers::update_account)
                .delete(handlers::delete_account),
        )
}
