//! HTTP API handlers for civic-review

pub mod auth;
pub mod health;
pub mod issues;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use issues::{get_issue, list_issues, reply_to_issue, update_issue};
