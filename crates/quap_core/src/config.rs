//! Import run configuration.
//!
//! # Responsibility
//! - Provide the fixed default locations of the import document, database
//!   and log directory.
//! - Allow operators to override them through environment variables.
//!
//! # Invariants
//! - Empty override values are rejected instead of silently falling back.
//! - `log_level` is always one of `trace|debug|info|warn|error`.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_IMPORT_PATH: &str = "imports/questionnaire_imports.json";
pub const DEFAULT_DB_PATH: &str = "var/quap.db";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const ENV_IMPORT_PATH: &str = "QUAP_IMPORT_PATH";
pub const ENV_DB_PATH: &str = "QUAP_DB_PATH";
pub const ENV_LOG_DIR: &str = "QUAP_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "QUAP_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but blank.
    EmptyValue(&'static str),
    /// Variable holds an unknown log level.
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(key) => write!(f, "environment variable {key} must not be empty"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

/// Locations and verbosity of one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub import_path: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: &'static str,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            import_path: PathBuf::from(DEFAULT_IMPORT_PATH),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_level: default_log_level(),
        }
    }
}

impl ImportConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = non_empty(&lookup, ENV_IMPORT_PATH)? {
            config.import_path = PathBuf::from(value);
        }
        if let Some(value) = non_empty(&lookup, ENV_DB_PATH)? {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = non_empty(&lookup, ENV_LOG_DIR)? {
            config.log_dir = PathBuf::from(value);
        }
        if let Some(value) = non_empty(&lookup, ENV_LOG_LEVEL)? {
            config.log_level = normalize_level(&value).map_err(ConfigError::InvalidLogLevel)?;
        }
        Ok(config)
    }

    /// Resolves `log_dir` against `cwd` when it is relative.
    pub fn log_dir_in(&self, cwd: &Path) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            cwd.join(&self.log_dir)
        }
    }
}

fn non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Some(value) => Ok(Some(value.trim().to_string())),
    }
}
