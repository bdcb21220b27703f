//! Errors returned by the resource pool.

use crate::pool::ResourceId;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a [`ResourceManager`](crate::ResourceManager) callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by resource pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool was configured with values it cannot run with
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    /// The manager failed to create a new resource
    #[error("failed to create resource: {0}")]
    CreationFailed(#[source] BoxError),

    /// No resource became available before the timeout elapsed
    #[error("resource pool exhausted: no resource available within {0:?}")]
    PoolExhausted(Duration),

    /// A resource was released to a pool that does not have it checked out
    #[error("resource {0} is not checked out from this pool")]
    UnknownResource(ResourceId),

    /// Resetting a returned resource failed; the resource was discarded
    #[error("failed to reset resource {id} on release: {source}")]
    RecycleFailed {
        /// Identity of the discarded resource
        id: ResourceId,

        /// Error reported by the manager
        #[source]
        source: BoxError,
    },

    /// The pool has been closed
    #[error("resource pool is closed")]
    Closed,
}

impl PoolError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Only exhaustion is transient; every other error reflects a broken
    /// resource, a closed pool or a programming mistake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted(_))
    }
}
