//! In-memory mock driver.
//!
//! The mock keeps a shared set of committed tables per driver instance.
//! Each connection executes statements against that store with real
//! envelope and savepoint semantics: `START TRANSACTION` takes a snapshot,
//! `COMMIT TRANSACTION` publishes it, savepoints stack snapshots inside
//! the envelope. The statement grammar is the uppercase subset the layers
//! above actually emit (`CREATE TABLE`, `DROP TABLE IF EXISTS`,
//! `INSERT INTO ... VALUES`, `SELECT * FROM`, and the transaction control
//! statements); anything else fails with a driver error.
//!
//! Commits publish the whole snapshot, so concurrent enveloped writers
//! are last-committer-wins. That is fine for the single-writer shapes the
//! test suites use.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use sqltx_driver::{Driver, DriverConnection, DriverError, QueryResult, SqlValue};

type Rows = Vec<Vec<SqlValue>>;
type Tables = HashMap<String, Rows>;

struct SharedState {
    tables: Mutex<Tables>,
    /// Successful physical connections opened so far.
    connects: AtomicU64,
    /// Connections created before the current epoch report closed.
    epoch: AtomicU64,
    fail_connects: AtomicBool,
    fail_begins: AtomicBool,
    fail_commits: AtomicBool,
}

/// An in-memory driver for exercising the client and pool layers.
///
/// Clones share one store, so a cloned handle can observe and steer a
/// driver that was handed to a pool.
#[derive(Clone)]
pub struct MockDriver {
    shared: Arc<SharedState>,
}

impl MockDriver {
    /// Create a fresh driver with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedState {
                tables: Mutex::new(HashMap::new()),
                connects: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                fail_connects: AtomicBool::new(false),
                fail_begins: AtomicBool::new(false),
                fail_commits: AtomicBool::new(false),
            }),
        }
    }

    /// How many physical connections have been opened.
    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Make subsequent `connect` calls fail.
    pub fn fail_connects(&self, fail: bool) {
        self.shared.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// Make transaction- and savepoint-opening statements fail.
    pub fn fail_begins(&self, fail: bool) {
        self.shared.fail_begins.store(fail, Ordering::SeqCst);
    }

    /// Make `COMMIT TRANSACTION` fail.
    ///
    /// The failed transaction is aborted server-side: its work is
    /// discarded and the connection leaves the envelope.
    pub fn fail_commits(&self, fail: bool) {
        self.shared.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Close every connection opened so far.
    ///
    /// Existing handles report `is_open() == false` and fail all further
    /// statements; new connections are unaffected.
    pub fn sever_connections(&self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// The number of committed rows in a table, if it exists.
    #[must_use]
    pub fn committed_rows(&self, table: &str) -> Option<usize> {
        self.shared.tables.lock().get(table).map(Vec::len)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MockDriver {
    fn connect(&self, conninfo: &str) -> Result<Box<dyn DriverConnection>, DriverError> {
        if self.shared.fail_connects.load(Ordering::SeqCst) {
            return Err(DriverError::Connect {
                message: "injected connect failure".to_string(),
            });
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(conninfo = conninfo, "mock connection opened");
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            envelope: None,
            savepoints: Vec::new(),
            prepared: HashMap::new(),
        }))
    }
}

struct MockConnection {
    shared: Arc<SharedState>,
    epoch: u64,
    /// Working snapshot while inside `START TRANSACTION`.
    envelope: Option<Tables>,
    /// Savepoint snapshots inside the envelope, oldest first.
    savepoints: Vec<(String, Tables)>,
    prepared: HashMap<String, String>,
}

impl MockConnection {
    fn run(&mut self, statement: &str, params: &[SqlValue]) -> Result<QueryResult, DriverError> {
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        match tokens.as_slice() {
            ["START", "TRANSACTION", ..] => self.begin(),
            ["COMMIT", "TRANSACTION"] => self.commit(),
            ["ROLLBACK", "TRANSACTION"] => self.rollback(),
            ["SAVEPOINT", name] => self.savepoint(unquote(name)),
            ["RELEASE", "SAVEPOINT", name] => self.release_savepoint(unquote(name)),
            ["ROLLBACK", "TO", "SAVEPOINT", name] => self.rollback_to_savepoint(unquote(name)),
            ["CREATE", "TABLE", name] => self.create_table(name),
            ["DROP", "TABLE", "IF", "EXISTS", name] => self.drop_table(name),
            ["INSERT", "INTO", name, ..] => self.insert(name, params),
            ["SELECT", "*", "FROM", name] => self.select(name),
            _ => Err(DriverError::statement(format!(
                "unsupported statement: {statement}"
            ))),
        }
    }

    fn begin(&mut self) -> Result<QueryResult, DriverError> {
        if self.shared.fail_begins.load(Ordering::SeqCst) {
            return Err(DriverError::statement("begin failed (injected)"));
        }
        if self.envelope.is_some() {
            return Err(DriverError::statement("already in a transaction"));
        }
        self.envelope = Some(self.shared.tables.lock().clone());
        Ok(QueryResult::affected(0))
    }

    fn commit(&mut self) -> Result<QueryResult, DriverError> {
        let Some(working) = self.envelope.take() else {
            return Err(DriverError::statement("no transaction in progress"));
        };
        self.savepoints.clear();

        if self.shared.fail_commits.load(Ordering::SeqCst) {
            // Server-side abort: the work never lands.
            return Err(DriverError::statement("commit failed (injected)"));
        }

        *self.shared.tables.lock() = working;
        Ok(QueryResult::affected(0))
    }

    fn rollback(&mut self) -> Result<QueryResult, DriverError> {
        if self.envelope.take().is_none() {
            return Err(DriverError::statement("no transaction in progress"));
        }
        self.savepoints.clear();
        Ok(QueryResult::affected(0))
    }

    fn savepoint(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        if self.shared.fail_begins.load(Ordering::SeqCst) {
            return Err(DriverError::statement("savepoint failed (injected)"));
        }
        let Some(working) = &self.envelope else {
            return Err(DriverError::statement("SAVEPOINT outside a transaction"));
        };
        self.savepoints.push((name.to_string(), working.clone()));
        Ok(QueryResult::affected(0))
    }

    fn release_savepoint(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        let Some(index) = self.find_savepoint(name) else {
            return Err(DriverError::statement(format!("no such savepoint: {name}")));
        };
        // Releasing also releases every savepoint stacked after it; the
        // changes stay in the working snapshot.
        self.savepoints.truncate(index);
        Ok(QueryResult::affected(0))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        let Some(index) = self.find_savepoint(name) else {
            return Err(DriverError::statement(format!("no such savepoint: {name}")));
        };
        self.envelope = Some(self.savepoints[index].1.clone());
        // The named savepoint itself survives a rollback to it.
        self.savepoints.truncate(index + 1);
        Ok(QueryResult::affected(0))
    }

    fn find_savepoint(&self, name: &str) -> Option<usize> {
        self.savepoints.iter().rposition(|(n, _)| n == name)
    }

    fn create_table(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        self.write_tables(|tables| {
            if tables.contains_key(name) {
                return Err(DriverError::statement(format!("table exists: {name}")));
            }
            tables.insert(name.to_string(), Vec::new());
            Ok(QueryResult::affected(0))
        })
    }

    fn drop_table(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        self.write_tables(|tables| {
            tables.remove(name);
            Ok(QueryResult::affected(0))
        })
    }

    fn insert(&mut self, name: &str, params: &[SqlValue]) -> Result<QueryResult, DriverError> {
        let row = params.to_vec();
        self.write_tables(|tables| {
            let Some(rows) = tables.get_mut(name) else {
                return Err(DriverError::statement(format!("no such table: {name}")));
            };
            rows.push(row);
            Ok(QueryResult::affected(1))
        })
    }

    fn select(&mut self, name: &str) -> Result<QueryResult, DriverError> {
        self.read_tables(|tables| {
            let Some(rows) = tables.get(name) else {
                return Err(DriverError::statement(format!("no such table: {name}")));
            };
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            let columns = (0..width).map(|i| format!("c{i}")).collect();
            Ok(QueryResult::new(columns, rows.clone()))
        })
    }

    /// Reads see the envelope snapshot when one is open, the committed
    /// store otherwise.
    fn read_tables<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        match &self.envelope {
            Some(tables) => f(tables),
            None => f(&self.shared.tables.lock()),
        }
    }

    /// Writes go to the envelope snapshot when one is open (published at
    /// commit), straight to the committed store otherwise (autocommit).
    fn write_tables<R>(&mut self, f: impl FnOnce(&mut Tables) -> R) -> R {
        match &mut self.envelope {
            Some(tables) => f(tables),
            None => f(&mut self.shared.tables.lock()),
        }
    }
}

impl DriverConnection for MockConnection {
    fn is_open(&self) -> bool {
        self.epoch == self.shared.epoch.load(Ordering::SeqCst)
    }

    fn execute(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DriverError> {
        if !self.is_open() {
            return Err(DriverError::Closed);
        }
        self.run(statement, params)
    }

    fn execute_prepared(
        &mut self,
        name: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DriverError> {
        if !self.is_open() {
            return Err(DriverError::Closed);
        }
        let Some(statement) = self.prepared.get(name).cloned() else {
            return Err(DriverError::statement(format!(
                "no prepared statement: {name}"
            )));
        };
        self.run(&statement, params)
    }

    fn prepare(&mut self, name: &str, statement: &str) -> Result<(), DriverError> {
        if !self.is_open() {
            return Err(DriverError::Closed);
        }
        if self.prepared.contains_key(name) {
            return Err(DriverError::Prepare {
                name: name.to_string(),
                message: "prepared statement already exists".to_string(),
            });
        }
        self.prepared.insert(name.to_string(), statement.to_string());
        Ok(())
    }

    fn deallocate(&mut self, name: &str) -> Result<(), DriverError> {
        if !self.is_open() {
            return Err(DriverError::Closed);
        }
        if self.prepared.remove(name).is_none() {
            return Err(DriverError::statement(format!(
                "no prepared statement: {name}"
            )));
        }
        Ok(())
    }
}

fn unquote(token: &str) -> &str {
    token.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqltx_driver::Driver;

    fn connect(driver: &MockDriver) -> Box<dyn DriverConnection> {
        driver.connect("host=mock").unwrap()
    }

    #[test]
    fn test_autocommit_writes_are_shared() {
        let driver = MockDriver::new();
        let mut a = connect(&driver);
        let mut b = connect(&driver);

        a.execute("CREATE TABLE t", &[]).unwrap();
        a.execute("INSERT INTO t VALUES", &[SqlValue::Int(1)])
            .unwrap();

        let result = b.execute("SELECT * FROM t", &[]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(driver.connect_count(), 2);
    }

    #[test]
    fn test_envelope_isolation_until_commit() {
        let driver = MockDriver::new();
        let mut a = connect(&driver);
        let mut b = connect(&driver);

        a.execute("CREATE TABLE t", &[]).unwrap();
        a.execute("START TRANSACTION", &[]).unwrap();
        a.execute("INSERT INTO t VALUES", &[SqlValue::Int(1)])
            .unwrap();

        assert_eq!(b.execute("SELECT * FROM t", &[]).unwrap().len(), 0);
        a.execute("COMMIT TRANSACTION", &[]).unwrap();
        assert_eq!(b.execute("SELECT * FROM t", &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_savepoint_release_keeps_changes() {
        let driver = MockDriver::new();
        let mut conn = connect(&driver);

        conn.execute("CREATE TABLE t", &[]).unwrap();
        conn.execute("START TRANSACTION", &[]).unwrap();
        conn.execute("SAVEPOINT \"sp\"", &[]).unwrap();
        conn.execute("INSERT INTO t VALUES", &[SqlValue::Int(1)])
            .unwrap();
        conn.execute("RELEASE SAVEPOINT \"sp\"", &[]).unwrap();
        conn.execute("COMMIT TRANSACTION", &[]).unwrap();

        assert_eq!(driver.committed_rows("t"), Some(1));
    }

    #[test]
    fn test_rollback_to_savepoint_discards_changes() {
        let driver = MockDriver::new();
        let mut conn = connect(&driver);

        conn.execute("CREATE TABLE t", &[]).unwrap();
        conn.execute("START TRANSACTION", &[]).unwrap();
        conn.execute("SAVEPOINT \"sp\"", &[]).unwrap();
        conn.execute("INSERT INTO t VALUES", &[SqlValue::Int(1)])
            .unwrap();
        conn.execute("ROLLBACK TO SAVEPOINT \"sp\"", &[]).unwrap();
        conn.execute("COMMIT TRANSACTION", &[]).unwrap();

        assert_eq!(driver.committed_rows("t"), Some(0));
    }

    #[test]
    fn test_sever_closes_existing_connections_only() {
        let driver = MockDriver::new();
        let mut old = connect(&driver);
        driver.sever_connections();

        assert!(!old.is_open());
        assert!(matches!(
            old.execute("SELECT * FROM t", &[]),
            Err(DriverError::Closed)
        ));

        let fresh = connect(&driver);
        assert!(fresh.is_open());
    }

    #[test]
    fn test_unsupported_statement_errors() {
        let driver = MockDriver::new();
        let mut conn = connect(&driver);
        assert!(conn.execute("VACUUM FULL", &[]).is_err());
    }
}
