//! Pooled SQLite connections.
//!
//! A connection returned to the pool with a transaction still open has that
//! transaction rolled back before anyone else can borrow it, so borrowers
//! never see each other's uncommitted writes. A connection whose rollback
//! fails is closed instead of being reused.

use crate::error::Result;
use crate::settings::DatabaseConfig;
use book_review_pool::{
    PoolError, PoolStats, PoolStatus, ResourceHandle, ResourceManager, ResourcePool,
};
use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use std::time::Duration;

/// A connection leased from a [`ConnectionPool`]
pub type PooledConnection = ResourceHandle<SqliteManager>;

/// Opens, resets and closes SQLite connections for the pool
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: String,
    busy_timeout: Duration,
}

impl SqliteManager {
    /// Create a manager for the database described by `config`
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout(),
        }
    }

    /// Database path or URI connections are opened against
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ResourceManager for SqliteManager {
    type Resource = Connection;
    type Error = rusqlite::Error;

    fn create(&self) -> rusqlite::Result<Connection> {
        // Default flags include SQLITE_OPEN_URI, so shared-cache URIs work too
        let conn = Connection::open_with_flags(&self.path, OpenFlags::default())?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!("Opened SQLite connection to {}", self.path);
        Ok(conn)
    }

    fn recycle(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        if !conn.is_autocommit() {
            debug!("Rolling back transaction left open by the previous borrower");
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(&self, conn: Connection) {
        if let Err((_conn, e)) = conn.close() {
            warn!("Failed to close SQLite connection to {}: {}", self.path, e);
        }
    }
}

/// A bounded pool of SQLite connections
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<ResourcePool<SqliteManager>>,
}

impl ConnectionPool {
    /// Create a pool for the configured database.
    ///
    /// Connections are opened lazily, so an unreachable database surfaces on
    /// the first acquire rather than here.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let inner = ResourcePool::new(SqliteManager::new(config), config.pool.clone())?;
        info!("Connection pool ready for {}", config.path);
        Ok(Self { inner })
    }

    /// The underlying generic pool
    pub fn pool(&self) -> &Arc<ResourcePool<SqliteManager>> {
        &self.inner
    }

    /// Acquire a connection, waiting at most the configured acquire timeout
    pub async fn acquire(&self) -> std::result::Result<PooledConnection, PoolError> {
        self.inner.acquire().await
    }

    /// Acquire a connection, waiting at most `timeout`
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<PooledConnection, PoolError> {
        self.inner.acquire_timeout(timeout).await
    }

    /// Acquire a connection only if one is available right away
    pub fn try_acquire(&self) -> std::result::Result<PooledConnection, PoolError> {
        self.inner.try_acquire()
    }

    /// Return a connection, rolling back any transaction it still has open
    pub fn release(&self, conn: PooledConnection) -> std::result::Result<(), PoolError> {
        self.inner.release(conn)
    }

    /// Run `body` with a pooled connection, returning it afterwards
    pub async fn with_connection<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let timeout = self.inner.config().acquire_timeout;
        self.inner.with_resource(timeout, body).await
    }

    /// Run an async `body` with a pooled connection, returning it afterwards
    pub async fn with_connection_async<T, F>(&self, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Connection) -> Result<T>,
    {
        let timeout = self.inner.config().acquire_timeout;
        self.inner.with_resource_async(timeout, body).await
    }

    /// Close the pool and every connection in it.
    ///
    /// Connections still leased are closed when their lease ends.
    pub fn close(&self) -> usize {
        self.inner.close()
    }

    /// Snapshot of the pool's current state
    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    /// Cumulative pool statistics
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

impl From<Arc<ResourcePool<SqliteManager>>> for ConnectionPool {
    fn from(inner: Arc<ResourcePool<SqliteManager>>) -> Self {
        Self { inner }
    }
}
