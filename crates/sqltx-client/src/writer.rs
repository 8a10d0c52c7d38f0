//! Streaming row upload onto an open transaction.

use sqltx_driver::ToSql;

use crate::error::Result;
use crate::transaction::Transaction;

/// A helper for uploading many rows through one insert statement.
///
/// The writer rides on an already-open transaction: every inserted row
/// goes through it, so rolling the transaction back discards everything
/// the writer uploaded.
///
/// ```rust,ignore
/// let tx = conn.transaction(IsolationLevel::Default)?;
/// let mut writer = TableWriter::new(&tx, "INSERT INTO events VALUES ($1, $2)");
/// for event in events {
///     writer.insert(&[&event.id, &event.payload])?;
/// }
/// let uploaded = writer.finish();
/// tx.commit()?;
/// ```
pub struct TableWriter<'t> {
    transaction: &'t Transaction,
    statement: String,
    rows: u64,
}

impl<'t> TableWriter<'t> {
    /// Create a writer over the given transaction and insert statement.
    ///
    /// The statement may also be the name of a prepared statement.
    #[must_use]
    pub fn new(transaction: &'t Transaction, statement: impl Into<String>) -> Self {
        Self {
            transaction,
            statement: statement.into(),
            rows: 0,
        }
    }

    /// Upload one row; returns the rows affected by this insert.
    pub fn insert(&mut self, params: &[&dyn ToSql]) -> Result<u64> {
        let result = self.transaction.execute(&self.statement, params)?;
        self.rows += result.rows_affected();
        Ok(result.rows_affected())
    }

    /// Finish the upload and return the total number of rows affected.
    #[must_use]
    pub fn finish(self) -> u64 {
        tracing::debug!(rows = self.rows, "table writer finished");
        self.rows
    }
}
