//! Storage-layer errors for SQLite and file operations.

use super::error_code::{self, CovErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("compression failed: {message}")]
    Compression { message: String },

    #[error("{what} lock poisoned")]
    LockPoisoned { what: &'static str },
}

impl CovErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        error_code::STORAGE_ERROR
    }
}
