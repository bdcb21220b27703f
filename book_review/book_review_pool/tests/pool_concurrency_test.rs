//! Integration tests for admission control and waiting in the resource pool.

use book_review_pool::{PoolError, ResourceManager, ResourcePool, ResourcePoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks how many resources exist and how many are checked out at once
#[derive(Default)]
struct CountingManager {
    created: AtomicUsize,
    closed: AtomicUsize,
}

struct Slot {
    serial: usize,
}

impl ResourceManager for CountingManager {
    type Resource = Slot;
    type Error = String;

    fn create(&self) -> Result<Slot, String> {
        let serial = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Slot { serial })
    }

    fn close(&self, _resource: Slot) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn pool(capacity: usize) -> Arc<ResourcePool<CountingManager>> {
    ResourcePool::new(
        CountingManager::default(),
        ResourcePoolConfig::with_capacity(capacity),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_waiter_receives_released_resource() {
    let pool = pool(2);

    let a = pool.acquire_timeout(Duration::from_secs(1)).await.unwrap();
    let b = pool.acquire_timeout(Duration::from_secs(1)).await.unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(pool.status().created, 2);

    let a_id = a.id();
    let waiter_pool = Arc::clone(&pool);
    let c = tokio::spawn(async move {
        let started = Instant::now();
        let handle = waiter_pool.acquire_timeout(Duration::from_secs(1)).await;
        (handle.map(|h| h.id()), started.elapsed())
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    pool.release(a).unwrap();

    let (received, waited) = c.await.unwrap();
    assert_eq!(received.unwrap(), a_id);
    assert!(waited >= Duration::from_millis(100));
    assert!(waited < Duration::from_millis(200));

    // No third resource was ever created
    assert_eq!(pool.manager().created.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().waits, 1);
    drop(b);
}

#[tokio::test(start_paused = true)]
async fn test_waiter_times_out_when_nothing_is_released() {
    let pool = pool(2);
    let _a = pool.acquire_timeout(Duration::from_secs(1)).await.unwrap();
    let _b = pool.acquire_timeout(Duration::from_secs(1)).await.unwrap();

    let started = Instant::now();
    let result = pool.acquire_timeout(Duration::from_millis(50)).await;
    let waited = started.elapsed();

    assert!(matches!(result, Err(PoolError::PoolExhausted(t)) if t == Duration::from_millis(50)));
    assert!(waited >= Duration::from_millis(50));
    assert!(waited < Duration::from_millis(100));

    let status = pool.status();
    assert_eq!(status.created, 2);
    assert_eq!(status.in_use, 2);
    assert_eq!(status.idle, 0);
    assert_eq!(pool.stats().timeouts, 1);
}

#[tokio::test]
async fn test_acquire_below_capacity_never_waits() {
    let pool = pool(3);

    let mut held = Vec::new();
    for _ in 0..3 {
        // try_acquire never waits, so success here means no blocking was needed
        held.push(pool.try_acquire().unwrap());
    }
    assert_eq!(pool.stats().waits, 0);
    assert!(matches!(
        pool.try_acquire(),
        Err(PoolError::PoolExhausted(_))
    ));

    let serials: Vec<_> = held.iter().map(|h| h.serial).collect();
    assert_eq!(serials, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_cancelled_wait_leaves_no_residue() {
    let pool = pool(1);
    let held = pool.acquire().await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        pool.acquire_timeout(Duration::from_secs(10)),
    )
    .await;
    assert!(cancelled.is_err());

    let status = pool.status();
    assert_eq!(status.in_use, 1);
    assert_eq!(status.idle, 0);

    let id = held.id();
    pool.release(held).unwrap();

    let next = pool.try_acquire().unwrap();
    assert_eq!(next.id(), id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_never_exceeded_under_contention() {
    const CAPACITY: usize = 4;
    let pool = pool(CAPACITY);
    let checked_out = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let pool = Arc::clone(&pool);
        let checked_out = Arc::clone(&checked_out);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                let handle = pool.acquire_timeout(Duration::from_secs(10)).await.unwrap();
                let now = checked_out.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                assert!(pool.status().in_use <= CAPACITY);

                tokio::task::yield_now().await;

                checked_out.fetch_sub(1, Ordering::SeqCst);
                pool.release(handle).unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert!(pool.manager().created.load(Ordering::SeqCst) <= CAPACITY);

    let status = pool.status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.created, status.idle);
    assert_eq!(pool.stats().acquisitions, 32 * 20);
}

#[tokio::test]
async fn test_shutdown_closes_every_resource() {
    let pool = pool(3);
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();
    pool.release(a).unwrap();
    pool.release(b).unwrap();

    let closed_now = pool.close();
    assert_eq!(closed_now, 2);

    // The outstanding lease is closed as soon as it ends
    pool.release(c).unwrap();
    assert_eq!(pool.manager().closed.load(Ordering::SeqCst), 3);
    assert_eq!(pool.stats().resources_closed, 3);

    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    assert!(matches!(pool.try_acquire(), Err(PoolError::Closed)));
}

#[tokio::test]
async fn test_with_resource_releases_exactly_once_on_error() {
    let pool = pool(1);

    #[derive(Debug)]
    enum QueryError {
        Pool(PoolError),
        Rejected,
    }

    impl From<PoolError> for QueryError {
        fn from(err: PoolError) -> Self {
            QueryError::Pool(err)
        }
    }

    let result: Result<(), QueryError> = pool
        .with_resource(Duration::from_secs(1), |_slot| Err(QueryError::Rejected))
        .await;
    assert!(matches!(result, Err(QueryError::Rejected)));

    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.in_use, 0);
    assert_eq!(status.created, 1);

    // Holding the only resource makes the scoped call fail to acquire
    let held = pool.acquire().await.unwrap();
    let result: Result<(), QueryError> = pool
        .with_resource(Duration::ZERO, |_slot| Ok(()))
        .await;
    assert!(matches!(
        result,
        Err(QueryError::Pool(PoolError::PoolExhausted(_)))
    ));
    drop(held);
}
