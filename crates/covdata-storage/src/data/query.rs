//! Reading recorded data back, optionally restricted to a set of contexts.

use std::collections::{BTreeMap, BTreeSet};

use covdata_core::errors::{CoverageResult, DataError};
use covdata_core::numbits;
use covdata_core::types::{ArcPair, LineNo};
use regex::Regex;

use super::{CoverageData, DataState};
use crate::queries::{arcs, contexts, line_bits, tracers};

impl CoverageData {
    /// Does the data record arcs? False for line data and for empty data.
    pub fn has_arcs(&self) -> bool {
        self.cached_state().cache.mode.has_arcs()
    }

    /// The files known to have been measured, as far as this object has seen.
    pub fn measured_files(&self) -> BTreeSet<String> {
        self.cached_state().cache.file_map.keys().cloned().collect()
    }

    /// Every context recorded in the data.
    pub fn measured_contexts(&self) -> CoverageResult<BTreeSet<String>> {
        let mut state = self.lock("measured_contexts")?;
        self.connect(&mut state)?;
        let conn = state.conns.require()?;
        Ok(contexts::all_contexts(conn)?
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    /// The tracer plugin for a file: `None` if the file isn't measured, `""`
    /// if it was measured by the built-in tracer.
    pub fn file_tracer(&self, path: &str) -> CoverageResult<Option<String>> {
        let mut state = self.lock("file_tracer")?;
        self.connect(&mut state)?;
        let Some(&file_id) = state.cache.file_map.get(path) else {
            return Ok(None);
        };
        let conn = state.conns.require()?;
        Ok(Some(
            tracers::tracer_for_file(conn, file_id)?.unwrap_or_default(),
        ))
    }

    /// Restrict queries to the context named exactly `context`.
    pub fn set_query_context(&self, context: &str) -> CoverageResult<()> {
        let mut state = self.lock("set_query_context")?;
        self.connect(&mut state)?;
        let conn = state.conns.require()?;
        let ids = contexts::context_id(conn, context)?.into_iter().collect();
        state.cache.query_context_ids = Some(ids);
        Ok(())
    }

    /// Restrict queries to contexts matching any of `patterns`.
    ///
    /// Patterns are regular expressions searched anywhere in the context name.
    /// An empty list removes the restriction.
    pub fn set_query_contexts<S: AsRef<str>>(&self, patterns: &[S]) -> CoverageResult<()> {
        if patterns.is_empty() {
            return self.clear_query_contexts();
        }
        let regexes = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|e| DataError::InvalidContextPattern {
                    pattern: pattern.as_ref().to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.lock("set_query_contexts")?;
        self.connect(&mut state)?;
        let conn = state.conns.require()?;
        let ids = contexts::all_contexts(conn)?
            .into_iter()
            .filter(|(_, name)| regexes.iter().any(|re| re.is_match(name)))
            .map(|(id, _)| id)
            .collect();
        state.cache.query_context_ids = Some(ids);
        Ok(())
    }

    /// Remove any context restriction on queries.
    pub fn clear_query_contexts(&self) -> CoverageResult<()> {
        let mut state = self.lock("clear_query_contexts")?;
        self.start_using(&mut state)?;
        state.cache.query_context_ids = None;
        Ok(())
    }

    /// Executed lines of a file. `None` if the file was never measured.
    ///
    /// With arc data, the lines are the positive ends of the recorded arcs.
    pub fn lines(&self, path: &str) -> CoverageResult<Option<BTreeSet<LineNo>>> {
        let mut state = self.lock("lines")?;
        self.connect(&mut state)?;
        let state = &*state;
        let Some(&file_id) = state.cache.file_map.get(path) else {
            return Ok(None);
        };
        let conn = state.conns.require()?;
        let filter = state.cache.query_context_ids.as_deref();

        if state.cache.mode.has_arcs() {
            let lines = arcs::arcs_for_file(conn, file_id, filter)?
                .into_iter()
                .flat_map(|(fromno, tono)| [fromno, tono])
                .filter_map(positive_line)
                .collect();
            return Ok(Some(lines));
        }

        let mut lines = BTreeSet::new();
        for bits in line_bits::numbits_for_file(conn, file_id, filter)? {
            lines.extend(numbits::numbits_to_nums(&bits));
        }
        Ok(Some(lines))
    }

    /// Recorded arcs of a file. `None` if the file was never measured.
    pub fn arcs(&self, path: &str) -> CoverageResult<Option<BTreeSet<ArcPair>>> {
        let mut state = self.lock("arcs")?;
        self.connect(&mut state)?;
        let state = &*state;
        let Some(&file_id) = state.cache.file_map.get(path) else {
            return Ok(None);
        };
        let conn = state.conns.require()?;
        let filter = state.cache.query_context_ids.as_deref();
        Ok(Some(
            arcs::arcs_for_file(conn, file_id, filter)?
                .into_iter()
                .collect(),
        ))
    }

    /// For each executed line of a file, the contexts that executed it.
    /// Empty for a file that was never measured.
    pub fn contexts_by_lineno(
        &self,
        path: &str,
    ) -> CoverageResult<BTreeMap<LineNo, BTreeSet<String>>> {
        let mut state = self.lock("contexts_by_lineno")?;
        self.connect(&mut state)?;
        contexts_by_lineno_locked(&state, path)
    }
}

fn contexts_by_lineno_locked(
    state: &DataState,
    path: &str,
) -> CoverageResult<BTreeMap<LineNo, BTreeSet<String>>> {
    let mut result: BTreeMap<LineNo, BTreeSet<String>> = BTreeMap::new();
    let Some(&file_id) = state.cache.file_map.get(path) else {
        return Ok(result);
    };
    let conn = state.conns.require()?;
    let filter = state.cache.query_context_ids.as_deref();

    if state.cache.mode.has_arcs() {
        for (fromno, tono, context) in arcs::arcs_with_context(conn, file_id, filter)? {
            for line in [fromno, tono].into_iter().filter_map(positive_line) {
                result.entry(line).or_default().insert(context.clone());
            }
        }
    } else {
        for (bits, context) in line_bits::numbits_with_context(conn, file_id, filter)? {
            for line in numbits::numbits_to_nums(&bits) {
                result.entry(line).or_default().insert(context.clone());
            }
        }
    }
    Ok(result)
}

/// Arc ends at or below zero are entry/exit markers, not lines.
fn positive_line(end: i32) -> Option<LineNo> {
    LineNo::try_from(end).ok().filter(|&line| line > 0)
}
