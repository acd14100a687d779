//! Error handling for covdata.
//! One error enum per subsystem, `thiserror` only.

pub mod config_error;
pub mod coverage_error;
pub mod data_error;
pub mod error_code;
pub mod storage_error;

pub use config_error::ConfigError;
pub use coverage_error::{CoverageError, CoverageResult};
pub use data_error::DataError;
pub use error_code::CovErrorCode;
pub use storage_error::StorageError;
