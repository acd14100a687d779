//! Recording: contexts, lines, arcs, tracers, touching and purging files.
//!
//! Each call is one immediate transaction. Cached ids and the mode are only
//! updated after the transaction commits, so a failed call leaves the cache
//! matching the database.

use covdata_core::debug;
use covdata_core::errors::{CoverageResult, DataError, StorageError};
use covdata_core::numbits;
use covdata_core::types::{ArcPair, DataMode, LineNo};
use rusqlite::Connection;
use rustc_hash::FxHashMap;

use super::{CoverageData, DataCache, DataState};
use crate::connection::writer::with_immediate_transaction;
use crate::queries::{arcs, contexts, files, line_bits, meta, tracers};
use crate::schema;

impl CoverageData {
    /// Set the context for subsequent writes. `None` is the default (empty) context.
    pub fn set_context(&self, context: Option<&str>) -> CoverageResult<()> {
        self.debug.write_if(debug::DATAOP, || {
            format!("Setting coverage context: {context:?}")
        });
        let mut state = self.lock("set_context")?;
        state.cache.current_context = context.map(str::to_string);
        state.cache.current_context_id = None;
        Ok(())
    }

    /// Add measured line data: file path -> executed line numbers.
    ///
    /// Lines already recorded for a file and context are kept; the new lines
    /// are unioned in.
    pub fn add_lines<I, F, L>(&self, line_data: I) -> CoverageResult<()>
    where
        I: IntoIterator<Item = (F, L)>,
        F: AsRef<str>,
        L: IntoIterator<Item = LineNo>,
    {
        let line_data: Vec<(String, Vec<LineNo>)> = line_data
            .into_iter()
            .map(|(path, lines)| (path.as_ref().to_string(), lines.into_iter().collect()))
            .collect();
        self.debug.write_if(debug::DATAOP, || {
            let total: usize = line_data.iter().map(|(_, lines)| lines.len()).sum();
            format!("Adding lines: {} files, {total} lines total", line_data.len())
        });
        if self.debug.should(debug::DATAOP2) {
            for (path, lines) in &line_data {
                let mut sorted = lines.clone();
                sorted.sort_unstable();
                self.debug.write(&format!("  {path}: {sorted:?}"));
            }
        }
        let encoded: Vec<(String, Vec<u8>)> = line_data
            .into_iter()
            .map(|(path, lines)| (path, numbits::nums_to_numbits(lines)))
            .collect();

        let mut state = self.lock("add_lines")?;
        self.connect(&mut state)?;
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        let mut added = FxHashMap::default();
        let (mode, context_id) = with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            let mode = self.choose_mode(tx, cache.mode, DataMode::Lines)?;
            if encoded.is_empty() {
                return Ok((mode, None));
            }
            let context_id = resolve_context_id(tx, cache)?;
            for (path, bits) in &encoded {
                let file_id = file_id_for(tx, &cache.file_map, &mut added, path)?;
                let merged = match line_bits::get_numbits(tx, file_id, context_id)? {
                    Some(existing) => numbits::numbits_union(&existing, bits),
                    None => bits.clone(),
                };
                line_bits::replace_numbits(tx, file_id, context_id, &merged)?;
            }
            Ok((mode, Some(context_id)))
        })?;

        commit_cache(cache, mode, context_id, added);
        Ok(())
    }

    /// Add measured arc data: file path -> (from, to) transitions.
    ///
    /// Files with no arcs are skipped.
    pub fn add_arcs<I, F, A>(&self, arc_data: I) -> CoverageResult<()>
    where
        I: IntoIterator<Item = (F, A)>,
        F: AsRef<str>,
        A: IntoIterator<Item = ArcPair>,
    {
        let arc_data: Vec<(String, Vec<ArcPair>)> = arc_data
            .into_iter()
            .map(|(path, arcs)| (path.as_ref().to_string(), arcs.into_iter().collect()))
            .collect();
        self.debug.write_if(debug::DATAOP, || {
            let total: usize = arc_data.iter().map(|(_, arcs)| arcs.len()).sum();
            format!("Adding arcs: {} files, {total} arcs total", arc_data.len())
        });
        if self.debug.should(debug::DATAOP2) {
            for (path, arcs) in &arc_data {
                let mut sorted = arcs.clone();
                sorted.sort_unstable();
                self.debug.write(&format!("  {path}: {sorted:?}"));
            }
        }

        let mut state = self.lock("add_arcs")?;
        self.connect(&mut state)?;
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        let mut added = FxHashMap::default();
        let (mode, context_id) = with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            let mode = self.choose_mode(tx, cache.mode, DataMode::Arcs)?;
            if arc_data.is_empty() {
                return Ok((mode, None));
            }
            let context_id = resolve_context_id(tx, cache)?;
            for (path, file_arcs) in &arc_data {
                if file_arcs.is_empty() {
                    continue;
                }
                let file_id = file_id_for(tx, &cache.file_map, &mut added, path)?;
                arcs::insert_arcs(tx, file_id, context_id, file_arcs)?;
            }
            Ok((mode, Some(context_id)))
        })?;

        commit_cache(cache, mode, context_id, added);
        Ok(())
    }

    /// Record the tracer plugin responsible for each file.
    ///
    /// A file may not change from one non-empty tracer to another.
    pub fn add_file_tracers<I, F, T>(&self, file_tracers: I) -> CoverageResult<()>
    where
        I: IntoIterator<Item = (F, T)>,
        F: AsRef<str>,
        T: AsRef<str>,
    {
        let file_tracers: Vec<(String, String)> = file_tracers
            .into_iter()
            .map(|(path, tracer)| (path.as_ref().to_string(), tracer.as_ref().to_string()))
            .collect();
        self.debug.write_if(debug::DATAOP, || {
            format!("Adding file tracers: {} files", file_tracers.len())
        });

        let mut state = self.lock("add_file_tracers")?;
        self.connect(&mut state)?;
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        let mut added = FxHashMap::default();
        with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            record_tracers(tx, &cache.file_map, &mut added, &file_tracers)
        })?;

        cache.file_map.extend(added);
        Ok(())
    }

    /// Make sure `path` is recorded, even with no lines or arcs.
    pub fn touch_file(&self, path: &str, plugin_name: Option<&str>) -> CoverageResult<()> {
        self.touch_files([path], plugin_name)
    }

    /// Make sure each file is recorded, even with no lines or arcs, optionally
    /// with a tracer. Needs a mode to have been established.
    pub fn touch_files<I, F>(&self, paths: I, plugin_name: Option<&str>) -> CoverageResult<()>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        let paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        self.debug
            .write_if(debug::DATAOP, || format!("Touching {paths:?}"));

        let mut state = self.lock("touch_files")?;
        self.connect(&mut state)?;
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        if cache.mode.is_empty() {
            return Err(DataError::NoModeEstablished { operation: "touch" }.into());
        }

        let plugin = plugin_name.filter(|p| !p.is_empty());
        let mut added = FxHashMap::default();
        with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            for path in &paths {
                file_id_for(tx, &cache.file_map, &mut added, path)?;
            }
            if let Some(plugin) = plugin {
                let file_tracers: Vec<(String, String)> = paths
                    .iter()
                    .map(|path| (path.clone(), plugin.to_string()))
                    .collect();
                record_tracers(tx, &cache.file_map, &mut added, &file_tracers)?;
            }
            Ok(())
        })?;

        cache.file_map.extend(added);
        Ok(())
    }

    /// Delete the recorded lines or arcs of the given files. The files stay
    /// measured, with no data.
    pub fn purge_files<I, F>(&self, paths: I) -> CoverageResult<()>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        let paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();

        let mut state = self.lock("purge_files")?;
        self.connect(&mut state)?;
        self.debug.write_if(debug::DATAOP, || {
            format!("Purging {paths:?} for {:?}", state.location.display_name())
        });
        let DataState { conns, cache, .. } = &mut *state;
        let conn = conns.require()?;

        let delete: fn(&Connection, i64) -> Result<usize, StorageError> = match cache.mode {
            DataMode::Lines => line_bits::delete_for_file,
            DataMode::Arcs => arcs::delete_for_file,
            DataMode::Empty => {
                return Err(DataError::NoModeEstablished { operation: "purge" }.into());
            }
        };

        with_immediate_transaction(conn, |tx| -> CoverageResult<_> {
            for path in &paths {
                if let Some(&file_id) = cache.file_map.get(path) {
                    delete(tx, file_id)?;
                }
            }
            Ok(())
        })
    }

    /// Commit the data to lines or arcs, failing if it already holds the other.
    ///
    /// Returns the mode in force afterwards. The database is consulted when
    /// the cache has no mode, since another writer may have chosen one.
    pub(super) fn choose_mode(
        &self,
        conn: &Connection,
        cached: DataMode,
        wanted: DataMode,
    ) -> CoverageResult<DataMode> {
        let mut mode = if cached.is_empty() {
            schema::stored_mode(conn)?
        } else {
            cached
        };
        if mode.is_empty() {
            let value = if wanted.has_arcs() { "1" } else { "0" };
            if meta::insert_meta_if_absent(conn, meta::HAS_ARCS, value)? {
                return Ok(wanted);
            }
            mode = schema::stored_mode(conn)?;
        }
        if mode == wanted {
            return Ok(mode);
        }
        let err = if wanted.has_lines() {
            DataError::LinesIntoArcs
        } else {
            DataError::ArcsIntoLines
        };
        self.debug
            .write_if(debug::DATAOP, || format!("Error: {err}"));
        Err(err.into())
    }
}

/// Fold the results of a committed write into the cache.
fn commit_cache(
    cache: &mut DataCache,
    mode: DataMode,
    context_id: Option<i64>,
    added: FxHashMap<String, i64>,
) {
    cache.mode = mode;
    if context_id.is_some() {
        cache.current_context_id = context_id;
    }
    cache.file_map.extend(added);
}

/// Id of the current write context, creating its row if needed.
fn resolve_context_id(conn: &Connection, cache: &DataCache) -> CoverageResult<i64> {
    if let Some(id) = cache.current_context_id {
        return Ok(id);
    }
    let name = cache.current_context.as_deref().unwrap_or("");
    Ok(contexts::ensure_context(conn, name)?)
}

/// Id of `path`, adding a file row if neither the cache nor this transaction
/// has seen it. New ids go into `added` until the transaction commits.
fn file_id_for(
    conn: &Connection,
    file_map: &FxHashMap<String, i64>,
    added: &mut FxHashMap<String, i64>,
    path: &str,
) -> CoverageResult<i64> {
    if let Some(&id) = file_map.get(path).or_else(|| added.get(path)) {
        return Ok(id);
    }
    let id = files::ensure_file(conn, path)?;
    added.insert(path.to_string(), id);
    Ok(id)
}

/// Record tracers, rejecting a change between two non-empty names.
fn record_tracers(
    conn: &Connection,
    file_map: &FxHashMap<String, i64>,
    added: &mut FxHashMap<String, i64>,
    file_tracers: &[(String, String)],
) -> CoverageResult<()> {
    for (path, tracer) in file_tracers {
        let file_id = file_id_for(conn, file_map, added, path)?;
        let existing = tracers::tracer_for_file(conn, file_id)?.unwrap_or_default();
        if !existing.is_empty() {
            if existing != *tracer {
                return Err(DataError::ConflictingTracer {
                    path: path.clone(),
                    existing,
                    incoming: tracer.clone(),
                }
                .into());
            }
        } else if !tracer.is_empty() {
            tracers::set_tracer(conn, file_id, tracer)?;
        }
    }
    Ok(())
}
