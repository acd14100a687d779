//! meta table: key/value metadata.

use covdata_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};

use crate::to_storage_err;

pub const HAS_ARCS: &str = "has_arcs";
pub const VERSION: &str = "version";
pub const SYS_ARGV: &str = "sys_argv";
pub const WHEN: &str = "when";

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(to_storage_err)
}

/// Insert a key unless it already has a value. Returns true if inserted.
pub fn insert_meta_if_absent(
    conn: &Connection,
    key: &str,
    value: &str,
) -> Result<bool, StorageError> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(to_storage_err)?;
    Ok(changed > 0)
}
