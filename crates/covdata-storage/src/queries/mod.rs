//! Per-table query functions. Each takes a `&Connection` (a `Transaction`
//! derefs to one) and maps SQLite failures to `StorageError`.

pub mod arcs;
pub mod contexts;
pub mod files;
pub mod line_bits;
pub mod meta;
pub mod tracers;

/// Append `AND <column> IN (?, ?, ...)` for a context filter.
/// Returns the extended SQL; the caller binds the ids after its own parameters.
pub(crate) fn with_context_filter(sql: &str, column: &str, ids: Option<&[i64]>) -> String {
    match ids {
        None => sql.to_string(),
        Some(ids) => {
            let marks = vec!["?"; ids.len()].join(", ");
            format!("{sql} AND {column} IN ({marks})")
        }
    }
}
