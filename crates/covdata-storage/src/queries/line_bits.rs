//! line_bits table: one numbits blob per (file, context) in line mode.

use covdata_core::errors::StorageError;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::with_context_filter;
use crate::to_storage_err;

/// A line_bits row with its file and context resolved to names.
#[derive(Debug, Clone)]
pub struct NamedLineBits {
    pub path: String,
    pub context: String,
    pub numbits: Vec<u8>,
}

pub fn get_numbits(
    conn: &Connection,
    file_id: i64,
    context_id: i64,
) -> Result<Option<Vec<u8>>, StorageError> {
    conn.prepare_cached("SELECT numbits FROM line_bits WHERE file_id = ?1 AND context_id = ?2")
        .and_then(|mut stmt| {
            stmt.query_row(params![file_id, context_id], |row| row.get(0))
                .optional()
        })
        .map_err(to_storage_err)
}

/// Write the blob for (file, context), replacing any existing row.
/// Callers union with the existing blob first; this never merges by itself.
pub fn replace_numbits(
    conn: &Connection,
    file_id: i64,
    context_id: i64,
    numbits: &[u8],
) -> Result<(), StorageError> {
    conn.prepare_cached(
        "INSERT OR REPLACE INTO line_bits (file_id, context_id, numbits) VALUES (?1, ?2, ?3)",
    )
    .and_then(|mut stmt| stmt.execute(params![file_id, context_id, numbits]))
    .map_err(to_storage_err)?;
    Ok(())
}

/// Blobs for a file, restricted to `context_ids` if given.
pub fn numbits_for_file(
    conn: &Connection,
    file_id: i64,
    context_ids: Option<&[i64]>,
) -> Result<Vec<Vec<u8>>, StorageError> {
    let sql = with_context_filter(
        "SELECT numbits FROM line_bits WHERE file_id = ?",
        "context_id",
        context_ids,
    );
    let bind = std::iter::once(file_id).chain(context_ids.unwrap_or_default().iter().copied());

    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |row| row.get(0))
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

/// (blob, context name) pairs for a file, restricted to `context_ids` if given.
pub fn numbits_with_context(
    conn: &Connection,
    file_id: i64,
    context_ids: Option<&[i64]>,
) -> Result<Vec<(Vec<u8>, String)>, StorageError> {
    let sql = with_context_filter(
        "SELECT l.numbits, c.context FROM line_bits l, context c \
         WHERE l.context_id = c.id AND l.file_id = ?",
        "l.context_id",
        context_ids,
    );
    let bind = std::iter::once(file_id).chain(context_ids.unwrap_or_default().iter().copied());

    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

/// Every row with names instead of ids.
pub fn all_named(conn: &Connection) -> Result<Vec<NamedLineBits>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file.path, context.context, line_bits.numbits FROM line_bits \
             INNER JOIN file ON file.id = line_bits.file_id \
             INNER JOIN context ON context.id = line_bits.context_id",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(NamedLineBits {
                path: row.get(0)?,
                context: row.get(1)?,
                numbits: row.get(2)?,
            })
        })
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

pub fn delete_for_file(conn: &Connection, file_id: i64) -> Result<usize, StorageError> {
    conn.execute("DELETE FROM line_bits WHERE file_id = ?1", params![file_id])
        .map_err(to_storage_err)
}
