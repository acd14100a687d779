//! Configuration for coverage data files.
//! TOML-based, layered: env > project file > defaults.

pub mod data_config;

pub use data_config::{DataConfig, SuffixSetting};
