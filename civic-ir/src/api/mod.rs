//! HTTP API handlers for civic-ir

pub mod analytics;
pub mod auth;
pub mod health;
pub mod issues;

pub use auth::auth_middleware;
pub use health::health_routes;
