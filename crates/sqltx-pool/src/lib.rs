//! # sqltx-pool
//!
//! A connection pool over [`sqltx_client::Connection`].
//!
//! The pool hands out exclusive leases. A leased connection returns to
//! the idle set when the lease drops, after a health check: connections
//! found broken on the way back are discarded, and the next checkout
//! simply constructs a fresh one. Connections are created lazily; an
//! empty pool performs no I/O.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqltx_pool::Pool;
//!
//! let pool = Pool::new(driver, config);
//!
//! let conn = pool.checkout()?;
//! let tx = conn.transaction(IsolationLevel::Default)?;
//! // ...
//! tx.commit()?;
//! // Connection returns to the pool when `conn` drops
//!
//! // One-shot autocommit execution without handling the lease:
//! pool.execute("DELETE FROM sessions WHERE expired", &[])?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod pool;

pub use pool::{Pool, PooledConnection};
