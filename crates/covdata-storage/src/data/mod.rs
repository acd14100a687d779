//! CoverageData: the public API over one coverage data file.
//!
//! A data object records either lines or arcs (never both) per file and
//! context, plus the tracer plugin per file. It owns its connections, chooses
//! its file name, and notices when it has been carried into a forked child.
//!
//! All bookkeeping lives in one mutex-guarded `DataState`. Public methods take
//! the lock once with a scoped guard and pass the borrowed state to private
//! helpers, so nothing ever re-locks.

mod merge;
mod query;
mod serialize;
mod write;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use covdata_core::config::DataConfig;
use covdata_core::debug::{self, DebugControl};
use covdata_core::errors::{CoverageError, CoverageResult, DataError, StorageError};
use covdata_core::types::{DataMode, Suffix};
use rusqlite::Connection;
use rustc_hash::FxHashMap;

use crate::connection::{open_connection, ConnectionSet, DataLocation};
use crate::filename;
use crate::queries::{files, meta};
use crate::schema::{self, InitMetadata};

/// Receives non-fatal warnings.
pub type WarnFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Rewrites a file path from another data file into this one's namespace.
pub type PathMapper<'a> = &'a dyn Fn(&str) -> String;

/// Base name used when none is given.
pub const DEFAULT_BASENAME: &str = ".coverage";

/// Construction options for `CoverageData`.
#[derive(Clone, Default)]
pub struct DataOptions {
    /// Base name of the data file; `.coverage` if unset. May include directories.
    pub basename: Option<PathBuf>,
    pub suffix: Suffix,
    /// Keep everything in memory; never touch the disk.
    pub no_disk: bool,
    pub warn: Option<WarnFn>,
    pub debug: DebugControl,
}

impl DataOptions {
    /// Options described by a loaded configuration.
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            basename: Some(PathBuf::from(config.data_file())),
            suffix: config.suffix(),
            no_disk: config.no_disk(),
            warn: None,
            debug: DebugControl::new(config.debug.iter().cloned()),
        }
    }

    pub fn with_basename(mut self, basename: impl Into<PathBuf>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    pub fn with_suffix(mut self, suffix: Suffix) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.no_disk = true;
        self
    }

    pub fn with_warn(mut self, warn: WarnFn) -> Self {
        self.warn = Some(warn);
        self
    }

    pub fn with_debug(mut self, debug: DebugControl) -> Self {
        self.debug = debug;
        self
    }
}

impl fmt::Debug for DataOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataOptions")
            .field("basename", &self.basename)
            .field("suffix", &self.suffix)
            .field("no_disk", &self.no_disk)
            .field("warn", &self.warn.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

/// What we know about the data without asking the database.
#[derive(Debug, Default)]
pub(crate) struct DataCache {
    /// path -> file id, for every file known to exist in the database.
    pub(crate) file_map: FxHashMap<String, i64>,
    pub(crate) mode: DataMode,
    /// Context for subsequent writes. Survives resets.
    pub(crate) current_context: Option<String>,
    /// Memoized id of `current_context`.
    pub(crate) current_context_id: Option<i64>,
    /// Context ids that queries are restricted to; `None` means all.
    pub(crate) query_context_ids: Option<Vec<i64>>,
}

impl DataCache {
    /// Forget everything learned from the database. The write context is kept.
    fn clear(&mut self) {
        self.file_map.clear();
        self.mode = DataMode::Empty;
        self.current_context_id = None;
        self.query_context_ids = None;
    }
}

#[derive(Debug)]
pub(crate) struct DataState {
    pub(crate) location: DataLocation,
    pub(crate) conns: ConnectionSet,
    pub(crate) cache: DataCache,
    /// Process that owns the open connections.
    pub(crate) pid: u32,
    /// Has this object started using its data file (erasing or reading it)?
    pub(crate) have_used: bool,
}

/// Coverage data for one data file (or one in-memory database).
///
/// Collection methods (`add_lines`, `add_arcs`, `set_context`,
/// `add_file_tracers`) may be called from many threads at once.
pub struct CoverageData {
    basename: PathBuf,
    suffix: Suffix,
    no_disk: bool,
    warn: Option<WarnFn>,
    debug: DebugControl,
    state: Mutex<DataState>,
}

impl CoverageData {
    /// Create a data object. Nothing is opened or created until first use.
    pub fn new(options: DataOptions) -> Self {
        let basename = filename::absolute_basename(
            options
                .basename
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_BASENAME)),
        );
        let location = filename::choose_location(&basename, &options.suffix, options.no_disk);
        let state = DataState {
            conns: ConnectionSet::for_location(&location),
            location,
            cache: DataCache::default(),
            pid: std::process::id(),
            have_used: false,
        };
        Self {
            basename,
            suffix: options.suffix,
            no_disk: options.no_disk,
            warn: options.warn,
            debug: options.debug,
            state: Mutex::new(state),
        }
    }

    /// In-memory data with default options.
    pub fn in_memory() -> Self {
        Self::new(DataOptions::default().in_memory())
    }

    /// The base file name for storing data.
    pub fn base_filename(&self) -> &Path {
        &self.basename
    }

    /// Where the data is stored: the suffixed file name, or `:memory:`.
    pub fn data_filename(&self) -> PathBuf {
        self.cached_state().location.to_path_buf()
    }

    /// Start using an existing data file, without erasing it.
    pub fn read(&self) -> CoverageResult<()> {
        let mut state = self.lock("read")?;
        self.check_fork(&mut state)?;
        let exists = state.location.path().is_some_and(Path::exists);
        if exists {
            self.ensure_connection(&mut state)?;
            state.have_used = true;
        }
        Ok(())
    }

    /// Writes are durable as soon as each call returns; nothing to flush.
    pub fn write(&self) -> CoverageResult<()> {
        self.debug
            .write_if(debug::DATAIO, || "Writing data (no-op: already durable)".to_string());
        Ok(())
    }

    /// Erase the data, deleting the data file. With `parallel`, also delete
    /// the `<data file>.*` files written by parallel collection.
    pub fn erase(&self, parallel: bool) -> CoverageResult<()> {
        let mut state = self.lock("erase")?;
        self.erase_locked(&mut state, parallel)
    }

    /// True if at least one file is recorded. Never creates a data file.
    pub fn has_data(&self) -> bool {
        let mut state = match self.lock("has_data") {
            Ok(state) => state,
            Err(_) => return false,
        };
        if let Err(e) = self.check_fork(&mut state) {
            self.warn(&format!(
                "Couldn't read data from {}: {e}",
                state.location.display_name()
            ));
            return false;
        }
        if !state.conns.has_current() {
            let exists = state.location.path().is_some_and(Path::exists);
            if !exists {
                return false;
            }
        }
        match self.any_file(&mut state) {
            Ok(any) => any,
            Err(e) => {
                self.warn(&format!(
                    "Couldn't read data from {}: {e}",
                    state.location.display_name()
                ));
                false
            }
        }
    }

    fn any_file(&self, state: &mut DataState) -> CoverageResult<bool> {
        self.ensure_connection(state)?;
        Ok(files::any_file(state.conns.require()?)?)
    }

    /// Take the state lock for `operation`.
    fn lock(&self, operation: &str) -> CoverageResult<MutexGuard<'_, DataState>> {
        self.debug
            .write_if(debug::LOCK, || format!("Locking {:p} for {operation}", &self.state));
        let guard = self.state.lock().map_err(|_| StorageError::LockPoisoned {
            what: "coverage data",
        })?;
        self.debug
            .write_if(debug::LOCK, || format!("Locked  {:p} for {operation}", &self.state));
        Ok(guard)
    }

    /// Lock for reading cached values only. A poisoned lock still holds a
    /// readable cache.
    fn cached_state(&self) -> MutexGuard<'_, DataState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
        if let Some(warn) = &self.warn {
            warn(message);
        }
    }

    /// Reset if we are no longer the process that opened our connections.
    ///
    /// A forked child must not use its parent's SQLite handles. It starts over
    /// as a new, unused data object, under a new file name if the name was
    /// generated per process.
    fn check_fork(&self, state: &mut DataState) -> CoverageResult<()> {
        let pid = std::process::id();
        if state.pid == pid {
            return Ok(());
        }
        self.debug.write_if(debug::PROCESS, || {
            format!("Process changed from {} to {pid}: starting new data", state.pid)
        });
        self.reset(state)?;
        state.location = filename::choose_location(&self.basename, &self.suffix, self.no_disk);
        state.conns = ConnectionSet::for_location(&state.location);
        state.pid = pid;
        Ok(())
    }

    /// Call before using the data at all. The first use erases any old data
    /// file unless `read` was called first.
    fn start_using(&self, state: &mut DataState) -> CoverageResult<()> {
        self.check_fork(state)?;
        if !state.have_used {
            self.erase_locked(state, false)?;
        }
        state.have_used = true;
        Ok(())
    }

    /// Start using the data and open the calling thread's connection.
    fn connect(&self, state: &mut DataState) -> CoverageResult<()> {
        self.start_using(state)?;
        self.ensure_connection(state)
    }

    /// Make sure the calling thread has an open connection with a valid schema.
    fn ensure_connection(&self, state: &mut DataState) -> CoverageResult<()> {
        self.check_fork(state)?;
        if state.conns.has_current() {
            return Ok(());
        }
        self.debug.write_if(debug::DATAIO, || {
            format!("Opening data file {:?}", state.location.display_name())
        });
        let conn = open_connection(&state.location).map_err(|e| match &state.location {
            DataLocation::File(path) => CoverageError::from(DataError::NotCoverageFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
            DataLocation::Memory => e.into(),
        })?;
        self.read_db(&conn, &state.location, &mut state.cache)?;
        state.conns.set_current(conn);
        Ok(())
    }

    /// Validate (or create) the schema behind `conn` and load its metadata and
    /// file ids into the cache.
    fn read_db(
        &self,
        conn: &Connection,
        location: &DataLocation,
        cache: &mut DataCache,
    ) -> CoverageResult<()> {
        let display_name = location.display_name();
        let init = self.init_metadata();
        let schema = schema::ensure_schema(conn, &display_name, &init)?;
        if schema.created {
            self.debug
                .write_if(debug::DATAIO, || format!("Initing data file {display_name:?}"));
        }
        if !schema.mode.is_empty() {
            cache.mode = schema.mode;
        }
        cache.file_map.extend(files::load_file_map(conn)?);
        Ok(())
    }

    /// Drop cached lookups and reload them from `conn`.
    fn reload_cache(conn: &Connection, cache: &mut DataCache) -> CoverageResult<()> {
        cache.file_map = files::load_file_map(conn)?;
        cache.mode = schema::stored_mode(conn)?;
        cache.current_context_id = None;
        Ok(())
    }

    /// Metadata written when a data file is created. Process details are only
    /// recorded when debugging processes, so identical runs produce identical files.
    fn init_metadata(&self) -> InitMetadata {
        let mut extra = Vec::new();
        if self.debug.should(debug::PROCESS) {
            let argv: Vec<String> = std::env::args().collect();
            extra.push((meta::SYS_ARGV.to_string(), format!("{argv:?}")));
            extra.push((
                meta::WHEN.to_string(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ));
        }
        InitMetadata { extra }
    }

    /// Close connections and forget cached state. Files are untouched.
    fn reset(&self, state: &mut DataState) -> CoverageResult<()> {
        state.conns.close_all()?;
        state.cache.clear();
        state.have_used = false;
        Ok(())
    }

    fn erase_locked(&self, state: &mut DataState, parallel: bool) -> CoverageResult<()> {
        self.reset(state)?;
        let Some(path) = state.location.path() else {
            return Ok(());
        };
        self.debug
            .write_if(debug::DATAIO, || format!("Erasing data file {:?}", path.display()));
        filename::remove_if_exists(path)?;
        if parallel {
            for sibling in filename::parallel_files(path)? {
                self.debug.write_if(debug::DATAIO, || {
                    format!("Erasing parallel data file {:?}", sibling.display())
                });
                filename::remove_if_exists(&sibling)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CoverageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CoverageData");
        s.field("basename", &self.basename)
            .field("suffix", &self.suffix)
            .field("no_disk", &self.no_disk);
        if let Ok(state) = self.state.try_lock() {
            s.field("location", &state.location)
                .field("mode", &state.cache.mode)
                .field("files", &state.cache.file_map.len())
                .field("connections", &state.conns.len());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::tempdir;

    use super::*;

    fn pretend_forked(data: &CoverageData) {
        data.state.lock().unwrap().pid = 0;
    }

    #[test]
    fn forked_child_gets_a_new_file_and_leaves_the_parent_alone() {
        let dir = tempdir().unwrap();
        let data = CoverageData::new(
            DataOptions::default()
                .with_basename(dir.path().join(".coverage"))
                .with_suffix(Suffix::Generated),
        );
        data.add_lines([("parent.py", vec![1, 2])]).unwrap();
        let parent_file = data.data_filename();

        pretend_forked(&data);
        data.add_lines([("child.py", vec![7])]).unwrap();
        let child_file = data.data_filename();

        assert_ne!(parent_file, child_file);
        assert_eq!(
            data.measured_files(),
            BTreeSet::from(["child.py".to_string()])
        );

        let parent = CoverageData::new(DataOptions::default().with_basename(&parent_file));
        parent.read().unwrap();
        assert_eq!(
            parent.measured_files(),
            BTreeSet::from(["parent.py".to_string()])
        );
        assert_eq!(parent.lines("parent.py").unwrap(), Some(BTreeSet::from([1, 2])));
    }

    #[test]
    fn has_data_after_a_fork_creates_no_file() {
        let dir = tempdir().unwrap();
        let data = CoverageData::new(
            DataOptions::default()
                .with_basename(dir.path().join(".coverage"))
                .with_suffix(Suffix::Generated),
        );
        data.add_lines([("parent.py", vec![1])]).unwrap();
        let count = || std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count(), 1);

        pretend_forked(&data);
        assert!(!data.has_data());
        assert_eq!(count(), 1);
    }

    #[test]
    fn forked_in_memory_data_starts_empty() {
        let data = CoverageData::in_memory();
        data.add_arcs([("a.py", vec![(1, 2)])]).unwrap();

        pretend_forked(&data);

        assert_eq!(data.lines("a.py").unwrap(), None);
        assert!(data.measured_files().is_empty());
        assert!(!data.has_arcs());
        // The fresh store accepts either mode again.
        data.add_lines([("b.py", vec![3])]).unwrap();
        assert_eq!(data.lines("b.py").unwrap(), Some(BTreeSet::from([3])));
    }

    #[test]
    fn reset_keeps_the_write_context() {
        let data = CoverageData::in_memory();
        data.set_context(Some("test_one")).unwrap();
        data.add_lines([("a.py", vec![1])]).unwrap();
        data.erase(false).unwrap();

        data.add_lines([("a.py", vec![2])]).unwrap();
        assert_eq!(
            data.measured_contexts().unwrap(),
            BTreeSet::from(["test_one".to_string()])
        );
    }
}
