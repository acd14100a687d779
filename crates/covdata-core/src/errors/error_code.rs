//! CovErrorCode trait: stable codes for the error taxonomy.

/// Every error enum implements this to expose a structured code string
/// callers can match on without parsing messages.
pub trait CovErrorCode {
    /// Returns the error code string (e.g., "MODE_CONFLICT").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const DATA_FORMAT: &str = "DATA_FORMAT";
pub const MODE_CONFLICT: &str = "MODE_CONFLICT";
pub const TRACER_CONFLICT: &str = "TRACER_CONFLICT";
pub const EMPTY_DATA: &str = "EMPTY_DATA";
pub const SERIALIZATION: &str = "SERIALIZATION";
pub const INVALID_PATTERN: &str = "INVALID_PATTERN";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
