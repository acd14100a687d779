//! SQL text dump of a whole database, and its compressed transport form.
//!
//! The script recreates every table and index, then inserts every row, all
//! inside one transaction. Executing it against an empty database yields an
//! equivalent database.

use std::fmt::Write as _;

use covdata_core::errors::{DataError, StorageError};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::to_storage_err;

/// First byte of serialized data.
pub const FORMAT_MARKER: u8 = b'z';

/// zstd level used for serialized data.
const COMPRESSION_LEVEL: i32 = 3;

/// How many bytes of unrecognized input are shown in errors.
const PREVIEW_LEN: usize = 40;

/// Produce a SQL script reconstructing the database behind `conn`.
pub fn dump_script(conn: &Connection) -> Result<String, StorageError> {
    let mut script = String::from("BEGIN TRANSACTION;\n");

    let tables = schema_objects(conn, "table")?;
    for (_, sql) in &tables {
        script.push_str(sql);
        script.push_str(";\n");
    }
    for (name, _) in &tables {
        dump_rows(conn, name, &mut script)?;
    }
    for (_, sql) in schema_objects(conn, "index")? {
        script.push_str(&sql);
        script.push_str(";\n");
    }

    script.push_str("COMMIT;\n");
    Ok(script)
}

/// Compress a script and prefix the format marker.
pub fn compress_script(script: &str) -> Result<Vec<u8>, StorageError> {
    let compressed = zstd::encode_all(script.as_bytes(), COMPRESSION_LEVEL).map_err(|e| {
        StorageError::Compression {
            message: e.to_string(),
        }
    })?;
    let mut out = Vec::with_capacity(compressed.len() + 1);
    out.push(FORMAT_MARKER);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Check the marker and decompress back to a script.
pub fn decompress_script(data: &[u8]) -> Result<String, DataError> {
    match data.split_first() {
        Some((&FORMAT_MARKER, payload)) => {
            let bytes =
                zstd::decode_all(payload).map_err(|e| DataError::CorruptSerialization {
                    message: e.to_string(),
                })?;
            String::from_utf8(bytes).map_err(|e| DataError::CorruptSerialization {
                message: e.to_string(),
            })
        }
        _ => {
            let head = &data[..data.len().min(PREVIEW_LEN)];
            Err(DataError::UnrecognizedSerialization {
                head: format!("{:?}", String::from_utf8_lossy(head)),
                len: data.len(),
            })
        }
    }
}

/// (name, sql) of user tables or indexes in creation order.
fn schema_objects(conn: &Connection, kind: &str) -> Result<Vec<(String, String)>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = ?1 AND sql IS NOT NULL AND name NOT LIKE 'sqlite_%' \
             ORDER BY rowid",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([kind], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(to_storage_err)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(to_storage_err)?);
    }
    Ok(result)
}

fn dump_rows(conn: &Connection, table: &str, script: &mut String) -> Result<(), StorageError> {
    let quoted = quote_identifier(table);
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {quoted} ORDER BY rowid"))
        .map_err(to_storage_err)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([]).map_err(to_storage_err)?;

    while let Some(row) = rows.next().map_err(to_storage_err)? {
        script.push_str("INSERT INTO ");
        script.push_str(&quoted);
        script.push_str(" VALUES(");
        for i in 0..columns {
            if i > 0 {
                script.push(',');
            }
            let value = row.get_ref(i).map_err(to_storage_err)?;
            push_literal(script, value);
        }
        script.push_str(");\n");
    }
    Ok(())
}

fn push_literal(script: &mut String, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => script.push_str("NULL"),
        ValueRef::Integer(i) => {
            let _ = write!(script, "{i}");
        }
        ValueRef::Real(f) => {
            let _ = write!(script, "{f:?}");
        }
        ValueRef::Text(t) => {
            script.push('\'');
            script.push_str(&String::from_utf8_lossy(t).replace('\'', "''"));
            script.push('\'');
        }
        ValueRef::Blob(b) => {
            script.push_str("X'");
            for byte in b {
                let _ = write!(script, "{byte:02X}");
            }
            script.push('\'');
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
