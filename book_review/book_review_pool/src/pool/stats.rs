//! Pool statistics.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of the pool, read under the admission lock.
///
/// `created == idle + in_use` always holds for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum number of resources alive at once
    pub capacity: usize,

    /// Resources currently alive (idle + in use)
    pub created: usize,

    /// Resources waiting in the idle list
    pub idle: usize,

    /// Resources currently checked out
    pub in_use: usize,

    /// Whether the pool has been closed
    pub closed: bool,
}

/// Cumulative counters since the pool was created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources successfully created
    pub resources_created: usize,

    /// Resources closed, either at shutdown or after a failed reset
    pub resources_closed: usize,

    /// Successful acquisitions
    pub acquisitions: usize,

    /// Acquisitions that had to wait for a release
    pub waits: usize,

    /// Acquisitions that gave up after their timeout
    pub timeouts: usize,

    /// Calls to the manager's `create` that failed
    pub creation_failures: usize,

    /// Returned resources discarded because their reset failed
    pub recycle_failures: usize,
}

/// Lock-free counters backing [`PoolStats`]
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    resources_created: AtomicUsize,
    resources_closed: AtomicUsize,
    acquisitions: AtomicUsize,
    waits: AtomicUsize,
    timeouts: AtomicUsize,
    creation_failures: AtomicUsize,
    recycle_failures: AtomicUsize,
}

impl PoolCounters {
    pub(crate) fn created(&self) {
        self.resources_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn closed(&self, count: usize) {
        self.resources_closed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn acquired(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn waited(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn timed_out(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn creation_failed(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recycle_failed(&self) {
        self.recycle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            resources_created: self.resources_created.load(Ordering::Relaxed),
            resources_closed: self.resources_closed.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            recycle_failures: self.recycle_failures.load(Ordering::Relaxed),
        }
    }
}
