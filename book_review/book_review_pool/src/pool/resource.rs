//! Resource pooling for expensive, stateful resources like database connections.
//!
//! The pool keeps every piece of shared state (the idle list, the set of
//! checked-out resources and the live count) behind a single admission lock.
//! Callers that find the pool at capacity wait on a [`Notify`] that every
//! release signals, then re-run the admission check from the top.

use super::config::ResourcePoolConfig;
use super::manager::ResourceManager;
use super::stats::{PoolCounters, PoolStats, PoolStatus};
use crate::error::{BoxError, PoolError};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pooled resource.
///
/// Assigned when the resource is created and kept for its whole life, so the
/// same id seen twice means the same physical resource was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw numeric id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct IdleResource<R> {
    id: ResourceId,
    resource: R,
}

struct PoolState<R> {
    /// Idle resources, oldest first
    free: VecDeque<IdleResource<R>>,

    /// Resources currently leased out
    in_use: HashSet<ResourceId>,

    /// Live resources; always `free.len() + in_use.len()`
    created: usize,

    closed: bool,
}

/// A bounded pool of reusable resources.
///
/// [`close`](ResourcePool::close) closes idle resources right away. A resource
/// that is leased out when the pool closes is closed when its lease ends,
/// through [`release`](ResourcePool::release) or by dropping the handle, so
/// its `close` callback arrives after `close()` has returned.
pub struct ResourcePool<M: ResourceManager> {
    /// Creates, resets and closes resources
    manager: M,

    /// Configuration for this pool
    config: ResourcePoolConfig,

    /// Admission lock guarding all mutable pool state
    state: Mutex<PoolState<M::Resource>>,

    /// Signalled once per release, and to everyone on close
    available: Notify,

    counters: PoolCounters,
}

impl<M: ResourceManager> ResourcePool<M> {
    /// Create a new, empty resource pool.
    ///
    /// No resource is created up front; the first `capacity` acquisitions
    /// create them on demand.
    pub fn new(manager: M, config: ResourcePoolConfig) -> Result<Arc<Self>, PoolError> {
        config.validate()?;

        info!(
            "Creating resource pool (capacity {}, acquire timeout {:?})",
            config.capacity, config.acquire_timeout
        );

        Ok(Arc::new(Self {
            manager,
            state: Mutex::new(PoolState {
                free: VecDeque::new(),
                in_use: HashSet::new(),
                created: 0,
                closed: false,
            }),
            config,
            available: Notify::new(),
            counters: PoolCounters::default(),
        }))
    }

    /// The manager this pool creates resources with
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// The configuration this pool was created with
    pub fn config(&self) -> &ResourcePoolConfig {
        &self.config
    }

    /// Acquire a resource, waiting at most the configured acquire timeout
    pub async fn acquire(self: &Arc<Self>) -> Result<ResourceHandle<M>, PoolError> {
        self.acquire_timeout(self.config.acquire_timeout).await
    }

    /// Acquire a resource, waiting at most `timeout` for one to be released.
    ///
    /// An idle resource is reused first. Otherwise a new one is created if the
    /// pool is below capacity. Otherwise the caller waits for a release and
    /// tries again. The timeout covers only that wait, not resource creation.
    ///
    /// A timeout too large to express as a deadline, such as [`Duration::MAX`],
    /// waits without limit. Dropping the returned future while it waits leaves
    /// the pool untouched.
    pub async fn acquire_timeout(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Result<ResourceHandle<M>, PoolError> {
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        let mut waited = false;

        loop {
            let mut notified = pin!(self.available.notified());
            // Register before looking at the state so a release that lands
            // between the check and the wait still wakes us.
            notified.as_mut().enable();

            if let Some((id, resource)) = self.admit()? {
                return Ok(self.lease(id, resource));
            }

            if !waited {
                waited = true;
                self.counters.waited();
                trace!(
                    "All {} resources checked out, waiting up to {:?}",
                    self.config.capacity,
                    timeout
                );
            }

            let woken = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notified).await.is_ok(),
                None => {
                    notified.await;
                    true
                }
            };

            if !woken {
                self.counters.timed_out();
                warn!(
                    "Timed out after {:?} waiting for a resource (capacity {})",
                    timeout, self.config.capacity
                );
                return Err(PoolError::PoolExhausted(timeout));
            }
        }
    }

    /// Try to acquire a resource without waiting
    pub fn try_acquire(self: &Arc<Self>) -> Result<ResourceHandle<M>, PoolError> {
        match self.admit()? {
            Some((id, resource)) => Ok(self.lease(id, resource)),
            None => Err(PoolError::PoolExhausted(Duration::ZERO)),
        }
    }

    /// Acquire a resource, run `body` with it and release it on every exit path.
    ///
    /// A failure to acquire is converted into the body's error type. If the
    /// body fails, its error is returned even when the release fails as well.
    pub async fn with_resource<T, E, F>(
        self: &Arc<Self>,
        timeout: Duration,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut M::Resource) -> Result<T, E>,
        E: From<PoolError>,
    {
        let mut handle = self.acquire_timeout(timeout).await?;
        let outcome = body(&mut *handle);
        self.finish(handle, outcome)
    }

    /// Async counterpart of [`with_resource`](Self::with_resource).
    ///
    /// If the returned future is dropped while `body` is running, the lease is
    /// still returned to the pool.
    pub async fn with_resource_async<T, E, F>(
        self: &Arc<Self>,
        timeout: Duration,
        body: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut M::Resource) -> Result<T, E>,
        E: From<PoolError>,
    {
        let mut handle = self.acquire_timeout(timeout).await?;
        let outcome = body(&mut *handle).await;
        self.finish(handle, outcome)
    }

    fn finish<T, E>(&self, handle: ResourceHandle<M>, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<PoolError>,
    {
        match (outcome, self.release(handle)) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!("Release after a failed body also failed: {}", release_err);
                Err(err)
            }
        }
    }

    /// Return a leased resource to the pool.
    ///
    /// The manager's `recycle` runs first; if it fails the resource is closed
    /// instead of being reused and [`PoolError::RecycleFailed`] is returned.
    /// A handle issued by a different pool is rejected with
    /// [`PoolError::UnknownResource`] and goes back to its own pool.
    pub fn release(&self, mut handle: ResourceHandle<M>) -> Result<(), PoolError> {
        if !std::ptr::eq(Arc::as_ptr(&handle.pool), self) {
            error!(
                "Resource {} released to a pool that did not issue it",
                handle.id
            );
            return Err(PoolError::UnknownResource(handle.id));
        }

        match handle.resource.take() {
            Some(resource) => self.give_back(handle.id, resource),
            None => Ok(()),
        }
    }

    /// Close the pool.
    ///
    /// Every idle resource is closed now and every waiter fails with
    /// [`PoolError::Closed`]. Resources still leased are closed as soon as
    /// their lease ends. Returns the number of resources closed by this call.
    ///
    /// Meant for shutdown; acquisitions racing with `close` may still succeed
    /// until it takes the admission lock.
    pub fn close(&self) -> usize {
        let (drained, outstanding) = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;

            let drained: Vec<_> = state.free.drain(..).collect();
            state.created -= drained.len();
            (drained, state.in_use.len())
        };

        self.available.notify_waiters();

        let count = drained.len();
        for idle in drained {
            trace!("Closing idle resource {}", idle.id);
            self.manager.close(idle.resource);
        }
        self.counters.closed(count);

        info!(
            "Resource pool closed: {} idle resources closed, {} leased resources close on return",
            count, outstanding
        );

        count
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Snapshot of the pool's current state
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            capacity: self.config.capacity,
            created: state.created,
            idle: state.free.len(),
            in_use: state.in_use.len(),
            closed: state.closed,
        }
    }

    /// Cumulative statistics since the pool was created
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Run the admission check: reuse, create, or report that the caller must wait.
    fn admit(&self) -> Result<Option<(ResourceId, M::Resource)>, PoolError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(PoolError::Closed);
        }

        if let Some(idle) = state.free.pop_front() {
            state.in_use.insert(idle.id);
            self.counters.acquired();
            trace!("Reusing idle resource {}", idle.id);
            return Ok(Some((idle.id, idle.resource)));
        }

        if state.created < self.config.capacity {
            // Created under the lock so concurrent callers can never overshoot capacity
            let resource = self.manager.create().map_err(|e| {
                let source: BoxError = e.into();
                self.counters.creation_failed();
                warn!("Failed to create resource: {}", source);
                PoolError::CreationFailed(source)
            })?;

            let id = ResourceId::next();
            state.created += 1;
            state.in_use.insert(id);
            self.counters.created();
            self.counters.acquired();
            debug!(
                "Created resource {} ({}/{})",
                id, state.created, self.config.capacity
            );
            return Ok(Some((id, resource)));
        }

        Ok(None)
    }

    fn lease(self: &Arc<Self>, id: ResourceId, resource: M::Resource) -> ResourceHandle<M> {
        ResourceHandle {
            resource: Some(resource),
            id,
            pool: Arc::clone(self),
            acquired_at: Instant::now(),
        }
    }

    fn give_back(&self, id: ResourceId, mut resource: M::Resource) -> Result<(), PoolError> {
        {
            let mut state = self.state.lock();

            if !state.in_use.contains(&id) {
                drop(state);
                error!(
                    "Resource {} returned but not checked out; closing it",
                    id
                );
                self.discard(resource);
                return Err(PoolError::UnknownResource(id));
            }

            if state.closed {
                state.in_use.remove(&id);
                state.created -= 1;
                drop(state);
                debug!("Closing resource {} returned after shutdown", id);
                self.discard(resource);
                return Ok(());
            }
        }

        // Still counted as in use while it is being reset, so capacity holds
        if let Err(e) = self.manager.recycle(&mut resource) {
            let source: BoxError = e.into();
            self.counters.recycle_failed();
            warn!(
                "Discarding resource {}: reset on release failed: {}",
                id, source
            );

            {
                let mut state = self.state.lock();
                state.in_use.remove(&id);
                state.created -= 1;
            }
            self.discard(resource);
            // The freed slot lets a waiter create a replacement
            self.available.notify_one();

            return Err(PoolError::RecycleFailed { id, source });
        }

        let mut state = self.state.lock();
        state.in_use.remove(&id);

        if state.closed {
            state.created -= 1;
            drop(state);
            debug!("Closing resource {} returned during shutdown", id);
            self.discard(resource);
            return Ok(());
        }

        state.free.push_back(IdleResource { id, resource });
        drop(state);

        trace!("Resource {} returned to the pool", id);
        self.available.notify_one();
        Ok(())
    }

    fn discard(&self, resource: M::Resource) {
        self.manager.close(resource);
        self.counters.closed(1);
    }
}

impl<M: ResourceManager> Drop for ResourcePool<M> {
    fn drop(&mut self) {
        // Every lease holds a strong reference, so only idle resources remain
        self.close();
    }
}

impl<M: ResourceManager> fmt::Debug for ResourcePool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("status", &self.status())
            .finish()
    }
}

/// A lease on a pooled resource.
///
/// Dereferences to the resource. Dropping the handle returns the resource to
/// its pool; use [`ResourcePool::release`] to observe the outcome instead.
pub struct ResourceHandle<M: ResourceManager> {
    /// The resource itself; `None` once released
    resource: Option<M::Resource>,

    id: ResourceId,

    /// The pool this resource belongs to
    pool: Arc<ResourcePool<M>>,

    /// When this resource was acquired
    acquired_at: Instant,
}

impl<M: ResourceManager> ResourceHandle<M> {
    /// Identity of the leased resource
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The pool that issued this lease
    pub fn pool(&self) -> &Arc<ResourcePool<M>> {
        &self.pool
    }

    /// Get the time since this resource was acquired
    pub fn held_duration(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl<M: ResourceManager> Deref for ResourceHandle<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("resource present until released")
    }
}

impl<M: ResourceManager> DerefMut for ResourceHandle<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("resource present until released")
    }
}

impl<M: ResourceManager> Drop for ResourceHandle<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(e) = self.pool.give_back(self.id, resource) {
                warn!("Failed to return resource {} to the pool: {}", self.id, e);
            }
        }
    }
}

impl<M: ResourceManager> fmt::Debug for ResourceHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("held", &self.held_duration())
            .finish()
    }
}
