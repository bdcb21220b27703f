//! Error types for database access and settings.

use book_review_pool::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors raised by the database layer
#[derive(Debug, Error)]
pub enum DbError {
    /// Acquiring or releasing a pooled connection failed
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    /// SQLite reported an error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The settings file could not be read
    #[error("failed to read settings file {path}: {source}")]
    SettingsIo {
        /// Path of the settings file
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or has unknown keys
    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// A setting has an unusable value
    #[error("invalid setting {key}: {message}")]
    InvalidSetting {
        /// Name of the setting
        key: String,

        /// What is wrong with it
        message: String,
    },
}

impl DbError {
    /// Whether the operation may succeed if retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Pool(err) => err.is_retryable(),
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
