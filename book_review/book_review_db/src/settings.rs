//! Service settings.
//!
//! Settings come from an optional TOML file (by default `settings.toml`),
//! then `BOOK_REVIEW_*` environment variables override individual values.
//! Unknown keys in the file are rejected.

use crate::error::{DbError, Result};
use book_review_pool::ResourcePoolConfig;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "BOOK_REVIEW_";

/// Top-level service settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Database and connection pool settings
    pub database: DatabaseConfig,
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite database path or `file:` URI
    pub path: String,

    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Connection pool settings
    pub pool: ResourcePoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "db.sqlite3".to_string(),
            busy_timeout_ms: 5_000,
            pool: ResourcePoolConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Settings for the database at `path` with default pool settings
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Replace the pool settings
    pub fn with_pool(mut self, pool: ResourcePoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Busy timeout as a [`Duration`]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Settings {
    /// Parse settings from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DbError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded settings from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Load settings the way the service does at startup.
    ///
    /// Reads `path` (or [`DEFAULT_SETTINGS_FILE`]) if it exists, falls back to
    /// defaults otherwise, then applies overrides from the process environment.
    pub fn from_env_and_file(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
        let mut settings = if path.exists() {
            Self::load(path)?
        } else {
            debug!("No settings file at {}, using defaults", path.display());
            Self::default()
        };
        settings.apply_env(std::env::vars())?;
        Ok(settings)
    }

    /// Apply `BOOK_REVIEW_*` overrides from a list of variables.
    ///
    /// Recognized keys are `BOOK_REVIEW_DB`, `BOOK_REVIEW_BUSY_TIMEOUT_MS`,
    /// `BOOK_REVIEW_POOL_CAPACITY` and `BOOK_REVIEW_ACQUIRE_TIMEOUT_MS`.
    /// Other variables, including other `BOOK_REVIEW_*` ones, are ignored.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();

            match name {
                "DB" => self.database.path = value.to_string(),
                "BUSY_TIMEOUT_MS" => self.database.busy_timeout_ms = parse_number(key, value)?,
                "POOL_CAPACITY" => self.database.pool.capacity = parse_number(key, value)?,
                "ACQUIRE_TIMEOUT_MS" => {
                    self.database.pool.acquire_timeout =
                        Duration::from_millis(parse_number(key, value)?)
                }
                _ => {
                    trace!("Ignoring {} (not a database setting)", key);
                    continue;
                }
            }
            debug!("Setting overridden from environment: {}", key);
        }

        self.validate()
    }

    /// Check that the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(DbError::InvalidSetting {
                key: "database.path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        self.database.pool.validate()?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| DbError::InvalidSetting {
        key: key.to_string(),
        message: format!("{:?} is not a valid number: {}", value, e),
    })
}
