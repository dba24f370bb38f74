//! Issue store access for civic-ir
//!
//! Thin query modules over the shared SQLite schema created by
//! `civic_common::db::init`. Functions that take a generic executor can run
//! either against the pool or inside a transaction (`&mut *tx`).

pub mod analytics;
pub mod issues;
pub mod predictions;
pub mod status_changes;

use chrono::{DateTime, Utc};
use civic_common::Error;
use uuid::Uuid;

/// Parse a stored timestamp column; a bad value is a storage fault, not user input
pub(crate) fn stored_timestamp(column: &str, value: &str) -> civic_common::Result<DateTime<Utc>> {
    civic_common::time::from_storage(value)
        .map_err(|e| Error::Internal(format!("Corrupt {} column: {}", column, e)))
}

/// Parse a stored UUID column
pub(crate) fn stored_uuid(column: &str, value: &str) -> civic_common::Result<Uuid> {
    civic_common::uuid_utils::parse_stored(column, value)
        .map_err(|e| Error::Internal(format!("Corrupt {} column: {}", column, e)))
}
