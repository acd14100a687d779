//! Data file configuration with layered resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::debug::KNOWN_CATEGORIES;
use crate::errors::ConfigError;
use crate::types::Suffix;

/// Name of the project configuration file looked up in the root directory.
pub const CONFIG_FILE_NAME: &str = "covdata.toml";

/// Default base name of the data file.
pub const DEFAULT_DATA_FILE: &str = ".coverage";

/// Data file configuration.
///
/// Resolution order (highest priority first):
/// 1. Environment variables (`COVDATA_*`)
/// 2. Project config (`covdata.toml` in the root)
/// 3. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Base name of the data file. Relative names resolve against the
    /// working directory. Default: `.coverage`.
    pub data_file: Option<String>,
    /// `true` for a generated per-process suffix, `false` for none, or a
    /// literal string.
    pub suffix: Option<SuffixSetting>,
    /// Keep data in memory only.
    pub no_disk: Option<bool>,
    /// Enabled debug categories.
    pub debug: Vec<String>,
}

/// The two accepted spellings of a suffix in TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SuffixSetting {
    Flag(bool),
    Literal(String),
}

impl From<&SuffixSetting> for Suffix {
    fn from(setting: &SuffixSetting) -> Self {
        match setting {
            SuffixSetting::Flag(true) => Suffix::Generated,
            SuffixSetting::Flag(false) => Suffix::None,
            SuffixSetting::Literal(s) => Suffix::Literal(s.clone()),
        }
    }
}

impl DataConfig {
    /// Load configuration for the project rooted at `root`.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let project_config_path = root.join(CONFIG_FILE_NAME);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Base name of the data file, defaulted.
    pub fn data_file(&self) -> &str {
        self.data_file.as_deref().unwrap_or(DEFAULT_DATA_FILE)
    }

    /// Resolved suffix mode.
    pub fn suffix(&self) -> Suffix {
        self.suffix.as_ref().map(Suffix::from).unwrap_or_default()
    }

    pub fn no_disk(&self) -> bool {
        self.no_disk.unwrap_or(false)
    }

    pub fn validate(config: &DataConfig) -> Result<(), ConfigError> {
        if let Some(data_file) = &config.data_file {
            if data_file.trim().is_empty() {
                return Err(ConfigError::ValidationFailed {
                    field: "data_file".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        if let Some(SuffixSetting::Literal(s)) = &config.suffix {
            if s.contains(['/', '\\']) {
                return Err(ConfigError::ValidationFailed {
                    field: "suffix".to_string(),
                    message: "must not contain path separators".to_string(),
                });
            }
        }
        for category in &config.debug {
            if !KNOWN_CATEGORIES.contains(&category.as_str()) {
                return Err(ConfigError::ValidationFailed {
                    field: "debug".to_string(),
                    message: format!("unknown debug category {category:?}"),
                });
            }
        }
        Ok(())
    }

    fn merge_toml_file(config: &mut DataConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: DataConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins where it has a value.
    fn merge(base: &mut DataConfig, other: &DataConfig) {
        if other.data_file.is_some() {
            base.data_file = other.data_file.clone();
        }
        if other.suffix.is_some() {
            base.suffix = other.suffix.clone();
        }
        if other.no_disk.is_some() {
            base.no_disk = other.no_disk;
        }
        if !other.debug.is_empty() {
            base.debug = other.debug.clone();
        }
    }

    fn apply_env_overrides(config: &mut DataConfig) {
        if let Ok(val) = std::env::var("COVDATA_FILE") {
            if !val.is_empty() {
                config.data_file = Some(val);
            }
        }
        if let Ok(val) = std::env::var("COVDATA_SUFFIX") {
            config.suffix = Some(match parse_bool(&val) {
                Some(flag) => SuffixSetting::Flag(flag),
                None => SuffixSetting::Literal(val),
            });
        }
        if let Ok(val) = std::env::var("COVDATA_NO_DISK") {
            if let Some(flag) = parse_bool(&val) {
                config.no_disk = Some(flag);
            }
        }
        if let Ok(val) = std::env::var("COVDATA_DEBUG") {
            config.debug = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
