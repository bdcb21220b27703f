#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Book Review Pool
//!
//! Bounded, asynchronous pooling of expensive stateful resources for the
//! book review service.
//!
//! The pool hands out at most `capacity` live resources at a time. Callers
//! that find the pool fully checked out wait, up to a timeout, for another
//! caller to give a resource back. Resources are created lazily, reset on
//! every return, and closed when the pool shuts down.
//!
//! ## Integration with Other Book Review Crates
//!
//! - **book_review_db**: specializes the pool for SQLite connections and rolls
//!   back abandoned transactions on return

/// Error taxonomy shared by every pool operation
pub mod error;

/// Resource pooling: configuration, lifecycle callbacks, leases and statistics
pub mod pool;

// Re-export key types for easier access
pub use error::{BoxError, PoolError};
pub use pool::{
    PoolStats, PoolStatus, ResourceHandle, ResourceId, ResourceManager, ResourcePool,
    ResourcePoolConfig,
};
