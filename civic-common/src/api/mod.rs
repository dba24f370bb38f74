//! API module for shared HTTP API functionality
//!
//! Provides token authentication and response types used by the civic services.
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Database operations (via sqlx)
//! - Shared types
//!
//! Each service wraps these with framework-specific extractors (Axum, etc.).

pub mod auth;
pub mod types;

pub use auth::{bearer_token, sign_token, verify_token, ApiAuthError, TokenClaims};
#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
pub use types::{ErrorResponse, HealthResponse};
