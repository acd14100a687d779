//! file table: measured source files.

use covdata_core::errors::StorageError;
use rusqlite::{params, Connection};
use rustc_hash::FxHashMap;

use crate::to_storage_err;

/// Every file, as path -> id.
pub fn load_file_map(conn: &Connection) -> Result<FxHashMap<String, i64>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT id, path FROM file")
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))
        .map_err(to_storage_err)?;

    let mut map = FxHashMap::default();
    for row in rows {
        let (path, id) = row.map_err(to_storage_err)?;
        map.insert(path, id);
    }
    Ok(map)
}

/// Id of `path`, inserting a row for it if needed.
pub fn ensure_file(conn: &Connection, path: &str) -> Result<i64, StorageError> {
    conn.prepare_cached("INSERT OR IGNORE INTO file (path) VALUES (?1)")
        .and_then(|mut stmt| stmt.execute(params![path]))
        .map_err(to_storage_err)?;
    conn.prepare_cached("SELECT id FROM file WHERE path = ?1")
        .and_then(|mut stmt| stmt.query_row(params![path], |row| row.get(0)))
        .map_err(to_storage_err)
}

/// Insert rows for every path not already present.
pub fn insert_files_if_absent<'a, I>(conn: &Connection, paths: I) -> Result<(), StorageError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO file (path) VALUES (?1)")
        .map_err(to_storage_err)?;
    for path in paths {
        stmt.execute(params![path]).map_err(to_storage_err)?;
    }
    Ok(())
}

/// Does the table have at least one file?
pub fn any_file(conn: &Connection) -> Result<bool, StorageError> {
    conn.query_row("SELECT EXISTS (SELECT 1 FROM file)", [], |row| row.get(0))
        .map_err(to_storage_err)
}
