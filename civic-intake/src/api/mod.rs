//! HTTP API handlers for civic-intake

pub mod health;
pub mod issues;
pub mod session;

pub use health::health_routes;
pub use issues::issue_routes;
