//! Top-level error returned by the public coverage data API.

use super::error_code::CovErrorCode;
use super::{ConfigError, DataError, StorageError};

/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type CoverageResult<T> = Result<T, CoverageError>;

impl CoverageError {
    /// The data error inside, if this is one.
    pub fn as_data(&self) -> Option<&DataError> {
        match self {
            Self::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl CovErrorCode for CoverageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Data(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
        }
    }
}
