//! PRAGMA configuration applied to every SQLite connection.
//!
//! Rollback journal (the data file is a single file at rest), NORMAL sync,
//! 5s busy_timeout, foreign_keys ON, temp_store MEMORY.

use covdata_core::errors::StorageError;
use rusqlite::Connection;

/// Apply the safety and performance pragmas to a connection.
pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = DELETE;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
        ",
    )
    .map_err(|e| StorageError::SqliteError {
        message: format!("failed to apply pragmas: {e}"),
    })
}

/// Current journal mode, lowercased.
pub fn journal_mode(conn: &Connection) -> Result<String, StorageError> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    Ok(mode.to_ascii_lowercase())
}
