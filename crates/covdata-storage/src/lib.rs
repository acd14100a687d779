//! covdata-storage: SQLite persistence for coverage data.
//!
//! `CoverageData` is the public entry point. The modules below it are usable on
//! their own against a raw `rusqlite::Connection` and are what the facade is
//! built from.

pub mod connection;
pub mod data;
pub mod dump;
pub mod filename;
pub mod queries;
pub mod schema;

pub use data::{CoverageData, DataOptions, PathMapper, WarnFn};

use covdata_core::errors::StorageError;

/// Convert a rusqlite error into a storage error.
pub(crate) fn to_storage_err(e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}
