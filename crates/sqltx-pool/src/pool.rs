//! Connection pool implementation.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use sqltx_client::{Config, Connection, Result};
use sqltx_driver::{Driver, QueryResult, ToSql};

/// A pool of database connections.
///
/// `Pool` is a cheap clonable handle; clones share one idle set.
/// Connections are constructed lazily through the driver and the stored
/// configuration, and the pool grows without bound: a checkout that finds
/// the idle set empty always constructs rather than waits.
///
/// Checkout hands out idle connections as-is; validation happens on the
/// return path, where broken connections are dropped instead of recycled.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    driver: Arc<dyn Driver>,
    config: Config,
    idle: Mutex<Vec<Connection>>,
}

impl PoolInner {
    /// Put a connection back, or discard it if it went bad while leased.
    fn release(&self, connection: Connection) {
        if connection.is_open() {
            tracing::trace!("returning connection to pool");
            self.idle.lock().push(connection);
        } else {
            tracing::debug!("discarding broken connection");
        }
    }
}

impl Pool {
    /// Create a pool over the given driver and configuration.
    ///
    /// No connection is established until the first checkout.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: Config) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                driver,
                config,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Lease a connection from the pool.
    ///
    /// Reuses an idle connection when one is available, otherwise
    /// constructs a new one; only construction can fail
    /// ([`sqltx_client::Error::ConnectFailed`]). The lease returns the
    /// connection to the pool on drop.
    pub fn checkout(&self) -> Result<PooledConnection> {
        // Keep the critical section to the pop itself; connection
        // construction below may block on the network.
        let idle = self.inner.idle.lock().pop();

        let connection = match idle {
            Some(connection) => {
                tracing::trace!("reusing idle connection");
                connection
            }
            None => Connection::open(&*self.inner.driver, &self.inner.config)?,
        };

        Ok(PooledConnection {
            connection,
            detached: false,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Execute a single statement in autocommit mode on a pooled
    /// connection, without exposing the lease.
    pub fn execute(&self, statement: &str, params: &[&dyn ToSql]) -> Result<QueryResult> {
        self.checkout()?.direct()?.execute(statement, params)
    }

    /// The number of idle connections currently held by the pool.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// An exclusive lease on a pooled connection.
///
/// Dereferences to [`Connection`]. When dropped, the connection goes
/// back to the pool (or is discarded if no longer open). Use
/// [`detach()`](PooledConnection::detach) to keep the connection past
/// the pool's custody.
pub struct PooledConnection {
    connection: Connection,
    detached: bool,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Detach the connection from the pool.
    ///
    /// The connection will not be returned when the lease ends; it lives
    /// for as long as the returned handle does.
    #[must_use]
    pub fn detach(mut self) -> Connection {
        self.detached = true;
        self.connection.clone()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.detached {
            self.pool.release(self.connection.clone());
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.connection)
            .field("detached", &self.detached)
            .finish()
    }
}
