//! Coverage data errors: unusable files, mode and tracer conflicts,
//! serialization problems.

use super::error_code::{self, CovErrorCode};

/// Errors about the content of coverage data, as opposed to the storage
/// engine underneath it.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data file {path:?} doesn't seem to be a coverage data file: {reason}")]
    NotCoverageFile { path: String, reason: String },

    #[error("Couldn't use data file {path:?}: wrong schema: {found} instead of {expected}")]
    WrongSchema {
        path: String,
        found: i64,
        expected: i64,
    },

    #[error("Can't add line measurements to existing branch data")]
    LinesIntoArcs,

    #[error("Can't add branch measurements to existing line data")]
    ArcsIntoLines,

    #[error("Can't combine arc data with line data")]
    CombineArcsWithLines,

    #[error("Can't combine line data with arc data")]
    CombineLinesWithArcs,

    #[error("Conflicting file tracer name for '{path}': {existing:?} vs {incoming:?}")]
    ConflictingTracer {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("Can't {operation} files in an empty CoverageData")]
    NoModeEstablished { operation: &'static str },

    #[error("Unrecognized serialization: {head} (head of {len} bytes)")]
    UnrecognizedSerialization { head: String, len: usize },

    #[error("Couldn't decode serialized data: {message}")]
    CorruptSerialization { message: String },

    #[error("Invalid context pattern {pattern:?}: {message}")]
    InvalidContextPattern { pattern: String, message: String },
}

impl DataError {
    /// True for the lines-vs-arcs conflicts, on write or on combine.
    pub fn is_mode_conflict(&self) -> bool {
        matches!(
            self,
            Self::LinesIntoArcs
                | Self::ArcsIntoLines
                | Self::CombineArcsWithLines
                | Self::CombineLinesWithArcs
        )
    }
}

impl CovErrorCode for DataError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotCoverageFile { .. } | Self::WrongSchema { .. } => error_code::DATA_FORMAT,
            Self::LinesIntoArcs
            | Self::ArcsIntoLines
            | Self::CombineArcsWithLines
            | Self::CombineLinesWithArcs => error_code::MODE_CONFLICT,
            Self::ConflictingTracer { .. } => error_code::TRACER_CONFLICT,
            Self::NoModeEstablished { .. } => error_code::EMPTY_DATA,
            Self::UnrecognizedSerialization { .. } | Self::CorruptSerialization { .. } => {
                error_code::SERIALIZATION
            }
            Self::InvalidContextPattern { .. } => error_code::INVALID_PATTERN,
        }
    }
}
