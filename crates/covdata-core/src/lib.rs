//! covdata-core: types shared by the coverage data store.
//!
//! - `numbits`: compact bitset encoding of executed line numbers
//! - `errors`: one error enum per subsystem, `thiserror` only
//! - `config`: TOML + environment configuration for data files
//! - `debug`: category-gated debug output routed through `tracing`
//! - `tracing`: subscriber initialization
//! - `types`: line/arc aliases, recording mode, file suffix

pub mod config;
pub mod debug;
pub mod errors;
pub mod numbits;
pub mod tracing;
pub mod types;

pub use debug::DebugControl;
pub use errors::{CoverageError, CoverageResult};
pub use types::{ArcPair, DataMode, LineNo, Suffix};
