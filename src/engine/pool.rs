//! Bounded pool of read-only SQLite connections.
//!
//! A `tokio` semaphore caps the number of connections in use. Idle
//! connections are kept for reuse; new ones are opened lazily up to the cap.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::config::PoolSettings;

use super::{EngineError, EngineResult};

struct PoolInner {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    max_connections: usize,
}

impl PoolInner {
    fn open(&self) -> EngineResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        Connection::open_with_flags(&self.path, flags).map_err(|source| EngineError::Open {
            path: self.path.clone(),
            source,
        })
    }
}

/// Cloneable handle to a shared pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open a pool on `path`, connecting once to fail fast on a bad path.
    pub fn open(path: impl AsRef<Path>, settings: &PoolSettings) -> EngineResult<Self> {
        let inner = PoolInner {
            path: path.as_ref().to_path_buf(),
            idle: Mutex::new(Vec::with_capacity(settings.max_connections)),
            permits: Arc::new(Semaphore::new(settings.max_connections)),
            acquire_timeout: Duration::from_millis(settings.acquire_timeout_ms),
            max_connections: settings.max_connections,
        };
        let first = inner.open()?;
        inner.idle.lock().push(first);
        debug!(path = %inner.path.display(), max = inner.max_connections, "connection pool opened");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Connections currently checked out.
    pub fn in_use(&self) -> usize {
        self.inner.max_connections - self.inner.permits.available_permits()
    }

    pub fn idle(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Wait for a free slot, up to the configured timeout.
    pub async fn acquire(&self) -> EngineResult<PooledConnection> {
        let timeout = self.inner.acquire_timeout;
        let permit = match tokio::time::timeout(timeout, self.inner.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(EngineError::PoolClosed),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "connection pool exhausted");
                return Err(EngineError::PoolTimeout(timeout));
            }
        };

        let reused = self.inner.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.inner.open()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Refuse further acquisitions; waiting callers fail with `PoolClosed`.
    pub fn close(&self) {
        self.inner.permits.close();
        self.inner.idle.lock().clear();
    }
}

/// A checked-out connection, returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    // Released after `drop` has put the connection back.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("pooled connection used after release"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.pool.permits.is_closed() {
                return;
            }
            if conn.is_autocommit() {
                self.pool.idle.lock().push(conn);
            } else {
                // A transaction is still open; discard rather than reuse.
                warn!("discarding connection with an open transaction");
            }
        }
    }
}
