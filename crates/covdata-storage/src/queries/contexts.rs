//! context table: named recording contexts.

use covdata_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;

use crate::to_storage_err;

pub fn context_id(conn: &Connection, context: &str) -> Result<Option<i64>, StorageError> {
    conn.prepare_cached("SELECT id FROM context WHERE context = ?1")
        .and_then(|mut stmt| stmt.query_row(params![context], |row| row.get(0)).optional())
        .map_err(to_storage_err)
}

/// Id of `context`, inserting a row for it if needed.
pub fn ensure_context(conn: &Connection, context: &str) -> Result<i64, StorageError> {
    if let Some(id) = context_id(conn, context)? {
        return Ok(id);
    }
    conn.execute("INSERT INTO context (context) VALUES (?1)", params![context])
        .map_err(to_storage_err)?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_contexts_if_absent<'a, I>(conn: &Connection, contexts: I) -> Result<(), StorageError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO context (context) VALUES (?1)")
        .map_err(to_storage_err)?;
    for context in contexts {
        stmt.execute(params![context]).map_err(to_storage_err)?;
    }
    Ok(())
}

/// Every context, as (id, name), ordered by id.
pub fn all_contexts(conn: &Connection) -> Result<Vec<(i64, String)>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, context FROM context ORDER BY id")
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

/// Every context, as name -> id.
pub fn context_id_map(conn: &Connection) -> Result<FxHashMap<String, i64>, StorageError> {
    Ok(all_contexts(conn)?
        .into_iter()
        .map(|(id, name)| (name, id))
        .collect())
}
