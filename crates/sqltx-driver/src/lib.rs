//! # sqltx-driver
//!
//! The driver boundary of the sqltx project: the traits a database driver
//! implements and the value/result types that cross that boundary.
//!
//! The higher layers (`sqltx-client`, `sqltx-pool`) never talk to a wire
//! protocol themselves. They funnel every statement through a
//! [`DriverConnection`] and receive a [`QueryResult`] back. A driver is
//! anything that can open such a connection from a connection string:
//!
//! ```rust,ignore
//! use sqltx_driver::{Driver, DriverConnection};
//!
//! let conn = driver.connect("host=localhost dbname=test")?;
//! let result = conn.execute("SELECT * FROM users", &[])?;
//! ```
//!
//! Parameters and result cells are carried as [`SqlValue`] descriptors;
//! the [`ToSql`] and [`FromSql`] traits convert Rust values to and from
//! that representation.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod result;
pub mod value;

pub use connection::{Driver, DriverConnection};
pub use error::DriverError;
pub use result::{Column, QueryResult, Row};
pub use value::{FromSql, SqlValue, ToSql, TypeError};
