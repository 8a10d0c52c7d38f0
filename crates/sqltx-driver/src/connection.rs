//! Driver connection traits.

use crate::error::DriverError;
use crate::result::QueryResult;
use crate::value::SqlValue;

/// A factory for physical database connections.
///
/// Implementations wrap a concrete wire protocol. The connection string
/// format is driver-defined; the layers above pass it through opaquely.
pub trait Driver: Send + Sync {
    /// Open a physical connection.
    fn connect(&self, conninfo: &str) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// An open physical connection to the database.
///
/// The caller is responsible for serializing access; implementations are
/// not required to tolerate concurrent calls. Dropping the handle closes
/// the physical connection.
pub trait DriverConnection: Send {
    /// Whether the physical connection is still healthy.
    fn is_open(&self) -> bool;

    /// Execute a statement given as SQL text.
    fn execute(&mut self, statement: &str, params: &[SqlValue])
    -> Result<QueryResult, DriverError>;

    /// Execute a previously prepared statement by name.
    fn execute_prepared(
        &mut self,
        name: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DriverError>;

    /// Prepare a named statement.
    ///
    /// Re-registering a name is driver-defined behavior; drivers are free
    /// to reject it.
    fn prepare(&mut self, name: &str, statement: &str) -> Result<(), DriverError>;

    /// Deallocate a previously prepared statement.
    fn deallocate(&mut self, name: &str) -> Result<(), DriverError>;
}
