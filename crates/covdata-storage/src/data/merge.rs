//! Combining another data object into this one.
//!
//! The source is read into memory under its own lock, which is released
//! before this object's lock is taken. The write is a single immediate
//! transaction, after which the cache is reloaded from the database.

use std::path::Path;
use std::ptr;

use covdata_core::debug;
use covdata_core::errors::{CoverageResult, DataError};
use covdata_core::numbits;
use covdata_core::types::DataMode;
use rusqlite::Connection;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{CoverageData, DataState, PathMapper};
use crate::connection::writer::with_immediate_transaction;
use crate::queries::{arcs, contexts, files, line_bits, tracers};
use crate::schema;

/// Everything in a source data object, with paths already remapped.
#[derive(Debug, Default)]
struct IncomingData {
    mode: DataMode,
    files: FxHashSet<String>,
    contexts: FxHashSet<String>,
    /// (path, context) -> numbits, unioned where remapping made keys collide.
    lines: FxHashMap<(String, String), Vec<u8>>,
    /// (path, context, from, to)
    arcs: Vec<(String, String, i32, i32)>,
    /// path -> tracer, only for files with a tracer row.
    tracers: FxHashMap<String, String>,
}

impl IncomingData {
    fn read(conn: &Connection, map_path: PathMapper<'_>) -> CoverageResult<Self> {
        let mut incoming = Self {
            mode: schema::stored_mode(conn)?,
            ..Self::default()
        };

        let remapped: FxHashMap<String, String> = files::load_file_map(conn)?
            .into_keys()
            .map(|path| {
                let mapped = map_path(&path);
                (path, mapped)
            })
            .collect();
        let remap = |path: &str| -> String {
            remapped
                .get(path)
                .cloned()
                .unwrap_or_else(|| map_path(path))
        };
        incoming.files.extend(remapped.values().cloned());
        incoming
            .contexts
            .extend(contexts::all_contexts(conn)?.into_iter().map(|(_, name)| name));

        for row in arcs::all_named(conn)? {
            incoming
                .arcs
                .push((remap(&row.path), row.context, row.fromno, row.tono));
        }

        for row in line_bits::all_named(conn)? {
            let key = (remap(&row.path), row.context);
            match incoming.lines.get_mut(&key) {
                Some(existing) => *existing = numbits::numbits_union(existing, &row.numbits),
                None => {
                    incoming.lines.insert(key, row.numbits);
                }
            }
        }

        for (path, tracer) in tracers::all_named(conn)? {
            incoming.tracers.insert(remap(&path), tracer);
        }
        Ok(incoming)
    }
}

impl CoverageData {
    /// Combine the data from `other` into this data.
    ///
    /// `map_path`, if given, rewrites each of `other`'s file paths before they
    /// are combined. Line data and arc data can't be combined, and a file
    /// can't have two different tracers; either failure leaves this data
    /// unchanged.
    pub fn update(&self, other: &CoverageData, map_path: Option<PathMapper<'_>>) -> CoverageResult<()> {
        if ptr::eq(self, other) {
            return Ok(());
        }
        self.debug.write_if(debug::DATAOP, || {
            format!(
                "Updating with data from {:?}",
                other.data_filename().display()
            )
        });

        let identity = |path: &str| path.to_string();
        let incoming = other.snapshot(map_path.unwrap_or(&identity))?;

        let mut state = self.lock("update")?;
        self.connect(&mut state)?;
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            let existing_mode = if cache.mode.is_empty() {
                schema::stored_mode(tx)?
            } else {
                cache.mode
            };
            check_combinable(existing_mode, incoming.mode)?;
            self.write_incoming(tx, &incoming)
        })?;

        Self::reload_cache(conn, cache)
    }

    /// Read all of this object's data for merging elsewhere.
    fn snapshot(&self, map_path: PathMapper<'_>) -> CoverageResult<IncomingData> {
        let mut state = self.lock("update source")?;
        self.check_fork(&mut state)?;
        // Reading an existing file counts as using it, so the source's next
        // write does not erase what was just merged from it.
        if state.location.path().is_some_and(Path::exists) {
            state.have_used = true;
        }
        self.ensure_connection(&mut state)?;
        let conn = state.conns.require()?;
        IncomingData::read(conn, map_path)
    }

    fn write_incoming(&self, conn: &Connection, incoming: &IncomingData) -> CoverageResult<()> {
        // Tracers already recorded here. A file with no tracer row counts as "".
        let mut this_tracers: FxHashMap<String, String> = files::load_file_map(conn)?
            .into_keys()
            .map(|path| (path, String::new()))
            .collect();
        this_tracers.extend(tracers::all_named(conn)?);

        files::insert_files_if_absent(conn, incoming.files.iter().map(String::as_str))?;
        let file_ids = files::load_file_map(conn)?;
        contexts::insert_contexts_if_absent(conn, incoming.contexts.iter().map(String::as_str))?;
        let context_ids = contexts::context_id_map(conn)?;

        let mut tracer_rows = Vec::new();
        for path in &incoming.files {
            let other_tracer = incoming.tracers.get(path).map_or("", String::as_str);
            if let Some(this_tracer) = this_tracers.get(path) {
                if this_tracer != other_tracer {
                    return Err(DataError::ConflictingTracer {
                        path: path.clone(),
                        existing: this_tracer.clone(),
                        incoming: other_tracer.to_string(),
                    }
                    .into());
                }
            }
            if !other_tracer.is_empty() {
                tracer_rows.push((file_ids[path], other_tracer));
            }
        }

        if !incoming.arcs.is_empty() {
            self.choose_mode(conn, DataMode::Empty, DataMode::Arcs)?;
            let rows = incoming.arcs.iter().map(|(path, context, fromno, tono)| {
                (file_ids[path], context_ids[context], *fromno, *tono)
            });
            arcs::insert_arc_rows(conn, rows)?;
        }

        if !incoming.lines.is_empty() {
            self.choose_mode(conn, DataMode::Empty, DataMode::Lines)?;
            for ((path, context), bits) in &incoming.lines {
                let file_id = file_ids[path];
                let context_id = context_ids[context];
                let merged = match line_bits::get_numbits(conn, file_id, context_id)? {
                    Some(existing) => numbits::numbits_union(&existing, bits),
                    None => bits.clone(),
                };
                line_bits::replace_numbits(conn, file_id, context_id, &merged)?;
            }
        }

        for (file_id, tracer) in tracer_rows {
            tracers::set_tracer(conn, file_id, tracer)?;
        }
        Ok(())
    }
}

/// Line data and arc data never mix. Empty data combines with anything.
fn check_combinable(existing: DataMode, incoming: DataMode) -> Result<(), DataError> {
    match (existing, incoming) {
        (DataMode::Lines, DataMode::Arcs) => Err(DataError::CombineArcsWithLines),
        (DataMode::Arcs, DataMode::Lines) => Err(DataError::CombineLinesWithArcs),
        _ => Ok(()),
    }
}
