pub mod gateway;
pub mod registry;

pub use gateway::NotificationGateway;
