//! arc table: one row per (file, context, from, to) in arc mode.

use covdata_core::errors::StorageError;
use covdata_core::types::ArcPair;
use rusqlite::{params, params_from_iter, Connection};

use super::with_context_filter;
use crate::to_storage_err;

/// An arc row with its file and context resolved to names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArc {
    pub path: String,
    pub context: String,
    pub fromno: i32,
    pub tono: i32,
}

/// Insert arcs for one (file, context); duplicates are ignored.
pub fn insert_arcs<'a, I>(
    conn: &Connection,
    file_id: i64,
    context_id: i64,
    arcs: I,
) -> Result<usize, StorageError>
where
    I: IntoIterator<Item = &'a ArcPair>,
{
    insert_arc_rows(
        conn,
        arcs.into_iter()
            .map(|&(fromno, tono)| (file_id, context_id, fromno, tono)),
    )
}

/// Insert (file_id, context_id, from, to) rows; duplicates are ignored.
pub fn insert_arc_rows<I>(conn: &Connection, rows: I) -> Result<usize, StorageError>
where
    I: IntoIterator<Item = (i64, i64, i32, i32)>,
{
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO arc (file_id, context_id, fromno, tono) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(to_storage_err)?;

    let mut count = 0;
    for (file_id, context_id, fromno, tono) in rows {
        count += stmt
            .execute(params![file_id, context_id, fromno, tono])
            .map_err(to_storage_err)?;
    }
    Ok(count)
}

/// Distinct arcs for a file, restricted to `context_ids` if given.
pub fn arcs_for_file(
    conn: &Connection,
    file_id: i64,
    context_ids: Option<&[i64]>,
) -> Result<Vec<ArcPair>, StorageError> {
    let sql = with_context_filter(
        "SELECT DISTINCT fromno, tono FROM arc WHERE file_id = ?",
        "context_id",
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

/// (from, to, context name) for a file, restricted to `context_ids` if given.
pub fn arcs_with_context(
    conn: &Connection,
    file_id: i64,
    context_ids: Option<&[i64]>,
) -> Result<Vec<(i32, i32, String)>, StorageError> {
    let sql = with_context_filter(
        "SELECT arc.fromno, arc.tono, context.context FROM arc, context \
         WHERE arc.file_id = ? AND arc.context_id = context.id",
        "arc.context_id",
        context_ids,
    );
    let bind = std::iter::once(file_id).chain(context_ids.unwrap_or_default().iter().copied());

    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

/// Every row with names instead of ids.
pub fn all_named(conn: &Connection) -> Result<Vec<NamedArc>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT file.path, context.context, arc.fromno, arc.tono FROM arc \
             INNER JOIN file ON file.id = arc.file_id \
             INNER JOIN context ON context.id = arc.context_id",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(NamedArc {
                path: row.get(0)?,
                context: row.get(1)?,
                fromno: row.get(2)?,
                tono: row.get(3)?,
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
    conn.execute("DELETE FROM arc WHERE file_id = ?1", params![file_id])
        .map_err(to_storage_err)
}
