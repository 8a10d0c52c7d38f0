//! # sqltx-testing
//!
//! Test infrastructure for sqltx development: an in-memory [`MockDriver`]
//! implementing the `sqltx-driver` traits, with transaction and savepoint
//! semantics faithful enough to exercise the client and pool layers, plus
//! hooks for injecting connection and statement failures.
//!
//! This crate also hosts the integration test suites that span
//! `sqltx-client` and `sqltx-pool`, keeping those crates free of circular
//! dev-dependencies.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqltx_testing::MockDriver;
//! use sqltx_client::{Config, Connection};
//!
//! let driver = MockDriver::new();
//! let conn = Connection::open(&driver, &Config::new())?;
//! conn.execute("CREATE TABLE users", &[])?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::MockDriver;

/// Install a `tracing` subscriber writing to the test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}
