//! # Civic Common Library
//!
//! Shared code for the civic issue reporting services including:
//! - Record models (issues, predictions, status changes)
//! - Database bootstrap
//! - Bearer token signing and verification
//! - API response types
//! - Configuration loading
//! - Utility functions

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::{
    Caller, Issue, IssueStatus, IssueView, Location, Prediction, Priority, Role, StatusChange,
};
