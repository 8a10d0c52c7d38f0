//! The transaction state machine.
//!
//! Four kinds of transaction share one surface: direct (autocommit),
//! top-level, top-level sub-transaction, and nested sub-transaction.
//! They differ only in the SQL issued when they open and close:
//!
//! | Kind             | Open                      | Commit              | Rollback                 |
//! |------------------|---------------------------|---------------------|--------------------------|
//! | direct           | —                         | —                   | —                        |
//! | top-level        | `START TRANSACTION [...]` | `COMMIT TRANSACTION`| `ROLLBACK TRANSACTION`   |
//! | top-level sub    | `START TRANSACTION`       | `COMMIT TRANSACTION`| `ROLLBACK TRANSACTION`   |
//! | nested sub       | `SAVEPOINT <name>`        | `RELEASE SAVEPOINT` | `ROLLBACK TO SAVEPOINT`  |
//!
//! Opening registers the transaction as the connection's current one;
//! closing (or dropping) restores whatever was current before. A
//! transaction dropped without an explicit [`commit`](Transaction::commit)
//! or [`rollback`](Transaction::rollback) rolls back implicitly, and any
//! failure on that path is swallowed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sqltx_driver::{QueryResult, SqlValue, ToSql};

use crate::connection::Connection;
use crate::error::Result;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// The server's default isolation level.
    #[default]
    Default,
    /// Serializable (highest isolation).
    Serializable,
    /// Repeatable read.
    RepeatableRead,
    /// Read committed.
    ReadCommitted,
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,
}

impl IsolationLevel {
    /// The statement that opens a top-level transaction at this level.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Default => "START TRANSACTION",
            Self::Serializable => "START TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            Self::RepeatableRead => "START TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            Self::ReadCommitted => "START TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::ReadUncommitted => "START TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
        }
    }
}

/// Process-wide transaction id counter. Ids are never reused, so a
/// connection's current-transaction slot can never confuse a stale id
/// with a live one. Savepoint names derive from the same counter, which
/// keeps them unique within any connection.
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_transaction_id() -> u64 {
    NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a transaction issues on open and close.
enum TxKind {
    /// Autocommit: no envelope, every statement takes effect immediately.
    Direct,
    /// An explicit `START TRANSACTION` envelope.
    Envelope,
    /// A savepoint inside an enclosing envelope.
    Savepoint { name: String },
}

impl TxKind {
    fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    fn commit_statement(&self) -> Option<String> {
        match self {
            Self::Direct => None,
            Self::Envelope => Some("COMMIT TRANSACTION".to_string()),
            Self::Savepoint { name } => Some(format!("RELEASE SAVEPOINT \"{name}\"")),
        }
    }

    fn rollback_statement(&self) -> Option<String> {
        match self {
            Self::Direct => None,
            Self::Envelope => Some("ROLLBACK TRANSACTION".to_string()),
            Self::Savepoint { name } => Some(format!("ROLLBACK TO SAVEPOINT \"{name}\"")),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Envelope => "transaction",
            Self::Savepoint { .. } => "savepoint",
        }
    }
}

/// Shared state of one transaction.
///
/// A sub-transaction owns an `Arc` to its predecessor, so an enclosing
/// transaction outlives everything opened on top of it regardless of the
/// order in which the caller drops the handles.
struct TxCore {
    connection: Connection,
    id: u64,
    kind: TxKind,
    previous: Option<Arc<TxCore>>,
    /// Set once the transaction has been explicitly closed (or its open
    /// statement failed); the drop path then does nothing.
    done: AtomicBool,
}

impl TxCore {
    fn previous_id(&self) -> u64 {
        self.previous.as_ref().map_or(0, |p| p.id)
    }

    /// Fail unless this transaction is still the connection's current one.
    fn check_current(&self) -> Result<()> {
        if self.connection.is_current_transaction(self.id) {
            Ok(())
        } else {
            Err(crate::Error::TransactionOrder)
        }
    }

    /// Close with the given statement.
    ///
    /// State is reset unconditionally: even when the close statement
    /// fails, the predecessor becomes current again and this transaction
    /// is finished. The failure still propagates.
    fn finish(&self, close_statement: Option<String>) -> Result<()> {
        self.check_current()?;
        self.done.store(true, Ordering::SeqCst);

        let result = match close_statement {
            Some(statement) => self.connection.execute_raw(&statement, &[]).map(|_| ()),
            None => Ok(()),
        };
        self.connection.set_current_transaction(self.previous_id());
        result
    }
}

impl Drop for TxCore {
    fn drop(&mut self) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }

        if let Some(statement) = self.kind.rollback_statement() {
            if self.connection.is_open() {
                // Cleanup must not raise; whatever goes wrong here is
                // logged and dropped.
                let result = self
                    .check_current()
                    .and_then(|()| self.connection.execute_raw(&statement, &[]).map(|_| ()));
                match result {
                    Ok(()) => {
                        tracing::debug!(id = self.id, "rolled back abandoned transaction");
                    }
                    Err(error) => {
                        tracing::warn!(
                            id = self.id,
                            error = %error,
                            "unable to roll back abandoned transaction"
                        );
                    }
                }
            }
        }

        self.connection.set_current_transaction(self.previous_id());
    }
}

/// A unit of work on a connection.
///
/// Created by [`Connection::direct`], [`Connection::transaction`], or
/// [`Transaction::subtransaction`]. While it is the connection's current
/// transaction it may execute statements; once superseded by a
/// sub-transaction, executing through it fails with
/// [`TransactionOrder`](crate::Error::TransactionOrder) until the
/// sub-transaction closes.
///
/// [`commit`](Transaction::commit) and [`rollback`](Transaction::rollback)
/// consume the transaction. Dropping it without either is equivalent to a
/// rollback (a no-op for direct transactions).
pub struct Transaction {
    core: Arc<TxCore>,
}

impl Transaction {
    pub(crate) fn open_direct(connection: Connection) -> Result<Self> {
        Self::open(connection, next_transaction_id(), TxKind::Direct, None, None)
    }

    pub(crate) fn open_top_level(connection: Connection, level: IsolationLevel) -> Result<Self> {
        Self::open(
            connection,
            next_transaction_id(),
            TxKind::Envelope,
            None,
            Some(level.as_sql().to_string()),
        )
    }

    fn open(
        connection: Connection,
        id: u64,
        kind: TxKind,
        previous: Option<Arc<TxCore>>,
        open_statement: Option<String>,
    ) -> Result<Self> {
        let expected = previous.as_ref().map_or(0, |p| p.id);
        connection.register_transaction(id, expected)?;
        tracing::debug!(kind = kind.label(), id = id, "opening transaction");

        let core = Arc::new(TxCore {
            connection,
            id,
            kind,
            previous,
            done: AtomicBool::new(false),
        });

        if let Some(statement) = open_statement {
            if let Err(error) = core.connection.execute_raw(&statement, &[]) {
                // The open statement failed: this transaction never came
                // into being. Restore the predecessor; there is nothing
                // to roll back.
                core.done.store(true, Ordering::SeqCst);
                core.connection.set_current_transaction(core.previous_id());
                return Err(error);
            }
        }

        Ok(Self { core })
    }

    /// Open a sub-transaction on top of this one.
    ///
    /// When this transaction is non-enveloped (direct), the
    /// sub-transaction opens a fresh `START TRANSACTION` envelope;
    /// otherwise it opens a uniquely named savepoint. Either way this
    /// transaction is superseded as current until the sub-transaction
    /// closes, at which point it becomes current again.
    pub fn subtransaction(&self) -> Result<Transaction> {
        self.core.check_current()?;

        let connection = self.core.connection.clone();
        let previous = Some(Arc::clone(&self.core));
        let id = next_transaction_id();

        if self.core.kind.is_direct() {
            Self::open(
                connection,
                id,
                TxKind::Envelope,
                previous,
                Some("START TRANSACTION".to_string()),
            )
        } else {
            let name = format!("SQLTX_{id}");
            let open_statement = format!("SAVEPOINT \"{name}\"");
            Self::open(
                connection,
                id,
                TxKind::Savepoint { name },
                previous,
                Some(open_statement),
            )
        }
    }

    /// Execute a statement (or a prepared statement, by name) through
    /// this transaction.
    pub fn execute(&self, statement: &str, params: &[&dyn ToSql]) -> Result<QueryResult> {
        self.core.check_current()?;
        let values: Vec<SqlValue> = params.iter().map(|p| p.to_sql()).collect();
        self.core.connection.execute_raw(statement, &values)
    }

    /// Commit and consume the transaction.
    ///
    /// A failed commit still finishes the transaction: the connection is
    /// left transaction-free and the error propagates (the server-side
    /// transaction is aborted per standard SQL semantics).
    pub fn commit(self) -> Result<()> {
        tracing::debug!(
            kind = self.core.kind.label(),
            id = self.core.id,
            "committing transaction"
        );
        self.core.finish(self.core.kind.commit_statement())
    }

    /// Roll back and consume the transaction.
    ///
    /// Like [`commit`](Transaction::commit), the transaction is finished
    /// even when the rollback statement itself fails.
    pub fn rollback(self) -> Result<()> {
        tracing::debug!(
            kind = self.core.kind.label(),
            id = self.core.id,
            "rolling back transaction"
        );
        self.core.finish(self.core.kind.rollback_statement())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.core.kind.label())
            .field("id", &self.core.id)
            .field("current", &self.core.check_current().is_ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_statements() {
        assert_eq!(IsolationLevel::Default.as_sql(), "START TRANSACTION");
        assert_eq!(
            IsolationLevel::Serializable.as_sql(),
            "START TRANSACTION ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(
            IsolationLevel::ReadUncommitted.as_sql(),
            "START TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"
        );
    }

    #[test]
    fn test_kind_close_statements() {
        assert_eq!(TxKind::Direct.commit_statement(), None);
        assert_eq!(TxKind::Direct.rollback_statement(), None);
        assert_eq!(
            TxKind::Envelope.commit_statement().as_deref(),
            Some("COMMIT TRANSACTION")
        );
        let sp = TxKind::Savepoint {
            name: "SQLTX_7".to_string(),
        };
        assert_eq!(
            sp.commit_statement().as_deref(),
            Some("RELEASE SAVEPOINT \"SQLTX_7\"")
        );
        assert_eq!(
            sp.rollback_statement().as_deref(),
            Some("ROLLBACK TO SAVEPOINT \"SQLTX_7\"")
        );
    }

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = next_transaction_id();
        let b = next_transaction_id();
        assert_ne!(a, b);
        assert_ne!(a, 0);
    }
}
