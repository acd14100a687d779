//! Coverage data schema: creation on first open, exact version check after.
//!
//! There are no migrations. A data file written with a different schema
//! version can't be used; the caller erases it and starts over.

pub mod v007_line_bits;

use covdata_core::errors::{CoverageResult, DataError, StorageError};
use covdata_core::types::DataMode;
use rusqlite::{params, Connection, OptionalExtension};

use crate::queries::meta;
use crate::to_storage_err;

/// The schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 7;

/// Name of the table whose presence marks a coverage data file.
pub const SCHEMA_TABLE: &str = "coverage_schema";

/// Metadata stamped into a freshly created data file.
#[derive(Debug, Clone, Default)]
pub struct InitMetadata {
    /// Extra (key, value) pairs written after `version`.
    pub extra: Vec<(String, String)>,
}

/// What a successful open found in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaState {
    /// True if the schema was created by this call.
    pub created: bool,
    pub mode: DataMode,
}

/// Make sure `conn` holds a usable coverage schema.
///
/// Creates the schema if the database has no `coverage_schema` table; otherwise
/// checks the stamped version. `display_name` names the file in errors.
pub fn ensure_schema(
    conn: &Connection,
    display_name: &str,
    init: &InitMetadata,
) -> CoverageResult<SchemaState> {
    let has_schema_table: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![SCHEMA_TABLE],
            |row| row.get(0),
        )
        .map_err(|e| DataError::NotCoverageFile {
            path: display_name.to_string(),
            reason: e.to_string(),
        })?;

    let created = if has_schema_table {
        check_version(conn, display_name)?;
        false
    } else {
        create_schema(conn, display_name, init)?;
        true
    };

    let mode = stored_mode(conn)?;
    Ok(SchemaState { created, mode })
}

fn check_version(conn: &Connection, display_name: &str) -> CoverageResult<()> {
    let version: Option<i64> = conn
        .query_row("SELECT version FROM coverage_schema", [], |row| row.get(0))
        .optional()
        .map_err(|e| DataError::NotCoverageFile {
            path: display_name.to_string(),
            reason: e.to_string(),
        })?;

    match version {
        Some(found) if found == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(DataError::WrongSchema {
            path: display_name.to_string(),
            found,
            expected: SCHEMA_VERSION,
        }
        .into()),
        None => Err(DataError::NotCoverageFile {
            path: display_name.to_string(),
            reason: "no schema version recorded".to_string(),
        }
        .into()),
    }
}

fn create_schema(conn: &Connection, display_name: &str, init: &InitMetadata) -> CoverageResult<()> {
    conn.execute_batch(v007_line_bits::SCHEMA_SQL)
        .map_err(|e| DataError::NotCoverageFile {
            path: display_name.to_string(),
            reason: e.to_string(),
        })?;
    conn.execute(
        "INSERT INTO coverage_schema (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )
    .map_err(to_storage_err)?;

    meta::insert_meta_if_absent(conn, meta::VERSION, env!("CARGO_PKG_VERSION"))?;
    for (key, value) in &init.extra {
        meta::insert_meta_if_absent(conn, key, value)?;
    }
    tracing::info!(version = SCHEMA_VERSION, file = display_name, "created coverage schema");
    Ok(())
}

/// The recording mode persisted in metadata; `Empty` if none is recorded yet.
pub fn stored_mode(conn: &Connection) -> Result<DataMode, StorageError> {
    Ok(match meta::get_meta(conn, meta::HAS_ARCS)? {
        Some(value) => DataMode::from_has_arcs(value.trim() != "0"),
        None => DataMode::Empty,
    })
}
