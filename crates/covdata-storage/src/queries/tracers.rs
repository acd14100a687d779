//! tracer table: the plugin responsible for each file.

use covdata_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};

use crate::to_storage_err;

/// The recorded tracer for a file id. `None` when the file has no tracer row.
pub fn tracer_for_file(conn: &Connection, file_id: i64) -> Result<Option<String>, StorageError> {
    conn.prepare_cached("SELECT tracer FROM tracer WHERE file_id = ?1")
        .and_then(|mut stmt| {
            stmt.query_row(params![file_id], |row| row.get::<_, Option<String>>(0))
                .optional()
        })
        .map(Option::flatten)
        .map_err(to_storage_err)
}

/// Record the tracer for a file. Callers check for conflicts first; an existing
/// row (possibly an empty name from another writer) is replaced.
pub fn set_tracer(conn: &Connection, file_id: i64, tracer: &str) -> Result<(), StorageError> {
    conn.prepare_cached("INSERT OR REPLACE INTO tracer (file_id, tracer) VALUES (?1, ?2)")
        .and_then(|mut stmt| stmt.execute(params![file_id, tracer]))
        .map_err(to_storage_err)?;
    Ok(())
}

/// Every tracer row as (path, tracer).
pub fn all_named(conn: &Connection) -> Result<Vec<(String, String)>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file.path, tracer.tracer FROM tracer \
             INNER JOIN file ON file.id = tracer.file_id",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
        })
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}
