//! # sqltx-client
//!
//! A transaction-disciplined execution layer over a single database
//! connection.
//!
//! A [`Connection`] guarantees that at most one logical transaction is
//! active on it at any time. Units of work nest: a sub-transaction opened
//! on top of an enveloped transaction becomes a savepoint, one opened on
//! top of autocommit becomes a fresh envelope, and every transaction that
//! goes out of scope without an explicit close rolls back on its own.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqltx_client::{Config, Connection, IsolationLevel};
//!
//! let config = Config::from_conninfo("host=localhost dbname=app")?;
//! let conn = Connection::open(&driver, &config)?;
//!
//! let tx = conn.transaction(IsolationLevel::Default)?;
//! tx.execute("INSERT INTO users VALUES ($1, $2)", &[&1, &"alice"])?;
//!
//! {
//!     let nested = tx.subtransaction()?;
//!     nested.execute("INSERT INTO users VALUES ($1, $2)", &[&2, &"bob"])?;
//!     nested.rollback()?;  // bob is gone, alice stays
//! }
//!
//! tx.commit()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod transaction;
pub mod writer;

// Re-export commonly used types
pub use config::Config;
pub use connection::Connection;
pub use error::{Error, Result};
pub use sqltx_driver::{FromSql, QueryResult, Row, SqlValue, ToSql};
pub use transaction::{IsolationLevel, Transaction};
pub use writer::TableWriter;
