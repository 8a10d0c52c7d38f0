//! Database connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sqltx_driver::{Driver, DriverConnection, QueryResult, SqlValue, ToSql};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transaction::{IsolationLevel, Transaction};

/// A connection to the database.
///
/// `Connection` is a cheap clonable handle; clones share one physical
/// driver connection. The physical connection closes when the last
/// handle (including any held by open transactions or a pool slot) is
/// dropped.
///
/// At most one transaction is current on a connection at any time. The
/// transaction entry points are [`direct`](Connection::direct),
/// [`transaction`](Connection::transaction), and
/// [`Transaction::subtransaction`]; opening a transaction while another
/// is current without going through `subtransaction()` fails with
/// [`Error::TransactionOrder`].
///
/// A connection is single-threaded by convention: sharing one across
/// threads requires external synchronization.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    driver: Mutex<Box<dyn DriverConnection>>,
    /// Id of the current transaction; 0 means none. Ids are
    /// process-unique and never reused.
    current: AtomicU64,
    /// Registered prepared statements, name to statement text.
    prepared: Mutex<HashMap<String, String>>,
}

impl Connection {
    /// Open a connection through the given driver.
    ///
    /// Fails with [`Error::ConnectFailed`] when the driver cannot
    /// establish the physical connection.
    pub fn open(driver: &dyn Driver, config: &Config) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            dbname = ?config.dbname,
            "connecting to database"
        );

        let conn = driver
            .connect(&config.conninfo())
            .map_err(Error::connect_failed)?;

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                driver: Mutex::new(conn),
                current: AtomicU64::new(0),
                prepared: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Whether the physical connection is still healthy.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.driver.lock().is_open()
    }

    /// Register a named prepared statement.
    ///
    /// Re-registering a name with the identical statement text is a
    /// silent no-op. Re-registering with different text is forwarded to
    /// the driver, which is free to reject it.
    pub fn prepare(&self, name: &str, statement: &str) -> Result<()> {
        validate_statement_name(name)?;

        let mut prepared = self.inner.prepared.lock();
        if prepared.get(name).is_some_and(|text| text == statement) {
            tracing::trace!(name = name, "statement already prepared");
            return Ok(());
        }

        tracing::debug!(name = name, "preparing statement");
        self.inner.driver.lock().prepare(name, statement)?;
        prepared.insert(name.to_string(), statement.to_string());
        Ok(())
    }

    /// Remove a named prepared statement.
    ///
    /// Fails with [`Error::UnknownStatement`] if the name was never
    /// registered on this connection.
    pub fn deallocate(&self, name: &str) -> Result<()> {
        let mut prepared = self.inner.prepared.lock();
        if !prepared.contains_key(name) {
            return Err(Error::UnknownStatement(name.to_string()));
        }

        tracing::debug!(name = name, "deallocating statement");
        self.inner.driver.lock().deallocate(name)?;
        prepared.remove(name);
        Ok(())
    }

    /// Open a direct (autocommit) transaction.
    ///
    /// Statements executed through it take effect immediately; commit
    /// and rollback are no-ops.
    pub fn direct(&self) -> Result<Transaction> {
        Transaction::open_direct(self.clone())
    }

    /// Open a top-level transaction with the given isolation level.
    pub fn transaction(&self, level: IsolationLevel) -> Result<Transaction> {
        Transaction::open_top_level(self.clone(), level)
    }

    /// Execute a single statement in autocommit mode.
    ///
    /// Shorthand for opening a direct transaction, executing, and
    /// letting it go.
    pub fn execute(&self, statement: &str, params: &[&dyn ToSql]) -> Result<QueryResult> {
        self.direct()?.execute(statement, params)
    }

    /// The single funnel through which SQL reaches the driver.
    ///
    /// Routes to the prepared-statement path when `statement` matches a
    /// registered name. Current-transaction checking is the calling
    /// transaction's responsibility.
    pub(crate) fn execute_raw(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult> {
        let prepared = self.inner.prepared.lock().contains_key(statement);
        tracing::debug!(
            statement = statement,
            params = params.len(),
            prepared = prepared,
            "executing statement"
        );

        let mut driver = self.inner.driver.lock();
        let result = if prepared {
            driver.execute_prepared(statement, params)?
        } else {
            driver.execute(statement, params)?
        };
        Ok(result)
    }

    /// Register `id` as the current transaction, expecting `expected`
    /// (0 for none) to be current right now.
    pub(crate) fn register_transaction(&self, id: u64, expected: u64) -> Result<()> {
        self.inner
            .current
            .compare_exchange(expected, id, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| Error::TransactionOrder)
    }

    /// Restore the current-transaction slot (0 for none).
    pub(crate) fn set_current_transaction(&self, id: u64) {
        self.inner.current.store(id, Ordering::SeqCst);
    }

    /// Whether `id` is the current transaction.
    pub(crate) fn is_current_transaction(&self, id: u64) -> bool {
        self.inner.current.load(Ordering::SeqCst) == id
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("current", &self.inner.current.load(Ordering::SeqCst))
            .finish()
    }
}

/// Validate a prepared statement name.
fn validate_statement_name(name: &str) -> Result<()> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static NAME_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]{0,62}$").unwrap());

    if name.is_empty() {
        return Err(Error::InvalidName("statement name cannot be empty".into()));
    }

    if !NAME_RE.is_match(name) {
        return Err(Error::InvalidName(format!(
            "invalid statement name '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/$, and be 1-63 characters",
        )));
    }

    Ok(())
}
