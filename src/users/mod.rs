//! # Users Module
//!
//! Account records, the credential store the auth core reads and writes
//! through, and the account management API built on the same store.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;
pub mod validators;

#[cfg(test)]
mod tests;

pub use models::{Account, NewAccount, Role};
pub use routes::users_routes;
pub use store::{CredentialStore, SqliteCredentialStore, StoreError};
