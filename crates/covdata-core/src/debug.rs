//! Category-gated debug output.
//!
//! Messages always go to `tracing` at DEBUG level under the `covdata::debug`
//! target; an optional sink receives the same text for callers that want to
//! capture it directly.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

/// Data file opens, creations, erases, dumps and loads.
pub const DATAIO: &str = "dataio";
/// Summaries of data operations (adds, merges, purges, context changes).
pub const DATAOP: &str = "dataop";
/// Full contents of added data. Noisy.
pub const DATAOP2: &str = "dataop2";
/// Acquisition of the collection lock.
pub const LOCK: &str = "lock";
/// Process-level details: forks, argv and timestamp metadata.
pub const PROCESS: &str = "process";

/// All categories understood by `DebugControl`.
pub const KNOWN_CATEGORIES: &[&str] = &[DATAIO, DATAOP, DATAOP2, LOCK, PROCESS];

/// Receives debug messages in addition to `tracing`.
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct DebugControl {
    categories: FxHashSet<String>,
    sink: Option<DebugSink>,
}

impl DebugControl {
    /// Enable the given categories.
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: DebugSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Should messages of this category be written?
    pub fn should(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    pub fn write(&self, message: &str) {
        ::tracing::debug!(target: "covdata::debug", "{message}");
        if let Some(sink) = &self.sink {
            sink(message);
        }
    }

    /// Write `message` if `category` is enabled. The message is built lazily.
    pub fn write_if<F>(&self, category: &str, message: F)
    where
        F: FnOnce() -> String,
    {
        if self.should(category) {
            self.write(&message());
        }
    }
}

impl fmt::Debug for DebugControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<&String> = self.categories.iter().collect();
        categories.sort();
        f.debug_struct("DebugControl")
            .field("categories", &categories)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
