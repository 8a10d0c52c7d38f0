//! Client error types.

use sqltx_driver::DriverError;
use thiserror::Error;

/// Errors surfaced by connections, transactions, and the pool.
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing a physical connection failed.
    #[error("connection failed: {message}")]
    ConnectFailed {
        /// Driver-reported failure message.
        message: String,
    },

    /// An operation went through a transaction that is not the
    /// connection's current one, or a second transaction was opened
    /// without going through `subtransaction()`.
    ///
    /// This is a usage error in the calling code, never a condition to
    /// recover from at runtime.
    #[error("transaction order error")]
    TransactionOrder,

    /// A prepared statement name violates the identifier rules.
    #[error("invalid statement name: {0}")]
    InvalidName(String),

    /// A prepared statement name was never registered.
    #[error("unknown prepared statement '{0}'")]
    UnknownStatement(String),

    /// A connection string could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A failure reported by the driver during statement execution.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl Error {
    pub(crate) fn connect_failed(source: DriverError) -> Self {
        Self::ConnectFailed {
            message: source.to_string(),
        }
    }
}

/// Convenience result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
