//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Password hashing and verification
//! - Access/refresh JWT issuance, verification and rotation
//! - Google/Facebook OAuth and identity linking
//! - The route capability table and the AuthedUser extractor

pub mod access;
pub mod extractors;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod oauth;
pub mod password;
pub mod routes;
pub mod service;
pub mod tokens;
pub mod validators;


pub use routes::auth_routes;
pub use service::{AuthError, AuthService};
