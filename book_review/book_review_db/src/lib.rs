#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Book Review DB
//!
//! Database access plumbing for the book review service.
//!
//! - [`ConnectionPool`]: a [`ResourcePool`](book_review_pool::ResourcePool) of
//!   SQLite connections that rolls back whatever transaction a borrower left
//!   open before the connection is reused
//! - [`Settings`]: service settings loaded from `settings.toml` and
//!   `BOOK_REVIEW_*` environment variables

/// SQLite connection pool
pub mod connection;

/// Error types for database access
pub mod error;

/// Service settings
pub mod settings;

pub use connection::{ConnectionPool, PooledConnection, SqliteManager};
pub use error::{DbError, Result};
pub use settings::{DatabaseConfig, Settings};
