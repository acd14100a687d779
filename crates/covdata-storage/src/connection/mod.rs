//! Connection management: one connection per thread for data files, one
//! shared connection for in-memory data.

pub mod pragmas;
pub mod writer;

use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

use covdata_core::errors::StorageError;
use rusqlite::Connection;
use rustc_hash::FxHashMap;

use self::pragmas::apply_pragmas;
use crate::to_storage_err;

/// Name reported for in-memory data.
pub const MEMORY_NAME: &str = ":memory:";

/// Where the data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    Memory,
    File(PathBuf),
}

impl DataLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::File(path) => Some(path),
        }
    }

    /// The location as a path; `:memory:` for in-memory data.
    pub fn to_path_buf(&self) -> PathBuf {
        match self {
            Self::Memory => PathBuf::from(MEMORY_NAME),
            Self::File(path) => path.clone(),
        }
    }

    /// Display form used in messages.
    pub fn display_name(&self) -> String {
        self.to_path_buf().display().to_string()
    }
}

/// Open a connection to `location` and apply pragmas. Does not touch the schema.
pub fn open_connection(location: &DataLocation) -> Result<Connection, StorageError> {
    let conn = match location {
        DataLocation::Memory => Connection::open_in_memory(),
        DataLocation::File(path) => Connection::open(path),
    }
    .map_err(|e| StorageError::SqliteError {
        message: format!("couldn't open {}: {e}", location.display_name()),
    })?;
    apply_pragmas(&conn)?;
    tracing::debug!(location = %location.display_name(), "opened connection");
    Ok(conn)
}

/// The open connections of one data object.
///
/// SQLite handles are not shared between threads: a data file gets one
/// connection per calling thread. In-memory data has no file to reopen, so all
/// threads share its single connection (always behind the owner's lock).
#[derive(Debug)]
pub enum ConnectionSet {
    PerThread(FxHashMap<ThreadId, Connection>),
    Shared(Option<Connection>),
}

impl ConnectionSet {
    pub fn for_location(location: &DataLocation) -> Self {
        match location {
            DataLocation::Memory => Self::Shared(None),
            DataLocation::File(_) => Self::PerThread(FxHashMap::default()),
        }
    }

    /// The connection usable from the calling thread, if one is open.
    pub fn current(&self) -> Option<&Connection> {
        match self {
            Self::PerThread(map) => map.get(&thread::current().id()),
            Self::Shared(conn) => conn.as_ref(),
        }
    }

    /// Like `current`, but a missing connection is an error.
    pub fn require(&self) -> Result<&Connection, StorageError> {
        self.current().ok_or_else(|| StorageError::SqliteError {
            message: "no open connection for this thread".to_string(),
        })
    }

    pub fn has_current(&self) -> bool {
        self.current().is_some()
    }

    /// Install `conn` as the calling thread's connection, replacing any previous one.
    pub fn set_current(&mut self, conn: Connection) {
        match self {
            Self::PerThread(map) => {
                map.insert(thread::current().id(), conn);
            }
            Self::Shared(slot) => *slot = Some(conn),
        }
    }

    /// Close every connection.
    pub fn close_all(&mut self) -> Result<(), StorageError> {
        let conns: Vec<Connection> = match self {
            Self::PerThread(map) => map.drain().map(|(_, conn)| conn).collect(),
            Self::Shared(slot) => slot.take().into_iter().collect(),
        };
        for conn in conns {
            conn.close().map_err(|(_, e)| to_storage_err(e))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::PerThread(map) => map.len(),
            Self::Shared(conn) => usize::from(conn.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
