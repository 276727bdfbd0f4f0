//! # Notifications Module
//!
//! WebSocket gateway for authenticated clients: per-account rooms, chat relay
//! between room members, and admin-driven order updates and broadcasts.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;


pub use routes::notifications_routes;
pub use services::NotificationGateway;
