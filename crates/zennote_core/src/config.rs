//! Store configuration.
//!
//! Loaded from an optional JSON file, optionally overlaid with `ZENNOTE_*`
//! environment variables. Every field has a default so a missing file or
//! a partial file is valid.

use crate::repo::snapshot_repo::normalize_store_key;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_STORE_KEY: &str = "ZENNOTE_STORE_KEY";
pub const ENV_AUTOSAVE_MS: &str = "ZENNOTE_AUTOSAVE_MS";
pub const ENV_DB_PATH: &str = "ZENNOTE_DB_PATH";

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    InvalidValue { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::InvalidValue { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

/// Settings for one document store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Key the whole collection is stored under.
    #[serde(default = "default_store_key")]
    pub store_key: String,
    /// Quiet period before a note edit is written.
    #[serde(default = "default_autosave_quiet_ms")]
    pub autosave_quiet_ms: u64,
    /// SQLite database file. `None` keeps the store in memory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_store_key() -> String {
    "zennote_db".to_string()
}

fn default_autosave_quiet_ms() -> u64 {
    1200
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_key: default_store_key(),
            autosave_quiet_ms: default_autosave_quiet_ms(),
            database_path: None,
        }
    }
}

impl StoreConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()
    }

    /// Defaults overlaid with the `ZENNOTE_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name; blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(store_key) = lookup(ENV_STORE_KEY) {
            self.store_key = store_key;
        }
        if let Some(raw) = lookup(ENV_AUTOSAVE_MS) {
            self.autosave_quiet_ms =
                raw.trim()
                    .parse()
                    .map_err(|err| ConfigError::InvalidValue {
                        field: "autosave_quiet_ms",
                        message: format!("`{raw}` is not a millisecond count: {err}"),
                    })?;
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        self.validate()
    }

    /// Checks field constraints and returns the normalized config.
    pub fn validate(mut self) -> ConfigResult<Self> {
        self.store_key =
            normalize_store_key(&self.store_key).map_err(|err| ConfigError::InvalidValue {
                field: "store_key",
                message: err.to_string(),
            })?;
        if self.autosave_quiet_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "autosave_quiet_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }

    pub fn autosave_quiet(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }
}
