//! Driver-level error types.

use thiserror::Error;

/// Errors reported by a database driver.
///
/// These surface from the physical connection: establishment failures,
/// statement execution failures, and operations attempted on a handle
/// that is no longer open. The message text is the driver's own.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Establishing the physical connection failed.
    #[error("connection failed: {message}")]
    Connect {
        /// Driver-reported failure message.
        message: String,
    },

    /// A statement failed to execute (syntax error, constraint violation,
    /// connection dropped mid-statement, ...).
    #[error("statement failed: {message}")]
    Statement {
        /// Driver-reported failure message.
        message: String,
    },

    /// Preparing a named statement failed.
    #[error("prepare of '{name}' failed: {message}")]
    Prepare {
        /// The statement name that was being registered.
        name: String,
        /// Driver-reported failure message.
        message: String,
    },

    /// The physical connection is closed.
    #[error("connection is closed")]
    Closed,
}

impl DriverError {
    /// Shorthand for a [`DriverError::Statement`] with the given message.
    pub fn statement(message: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
        }
    }
}
