//! Pool checkout, release, and recreation discipline.

use std::sync::Arc;

use sqltx_client::{Config, Error, IsolationLevel};
use sqltx_pool::Pool;
use sqltx_testing::MockDriver;

fn setup() -> (MockDriver, Pool) {
    sqltx_testing::init_tracing();
    let driver = MockDriver::new();
    let pool = Pool::new(Arc::new(driver.clone()), Config::new());
    (driver, pool)
}

#[test]
fn checkout_release_reuses_one_connection() {
    let (driver, pool) = setup();

    for _ in 0..5 {
        let conn = pool.checkout().unwrap();
        assert!(conn.is_open());
    }

    assert_eq!(driver.connect_count(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn broken_connection_is_discarded_on_release() {
    let (driver, pool) = setup();

    let conn = pool.checkout().unwrap();
    driver.sever_connections();
    drop(conn);
    assert_eq!(pool.idle_count(), 0);

    let fresh = pool.checkout().unwrap();
    assert!(fresh.is_open());
    assert_eq!(driver.connect_count(), 2);
}

#[test]
fn checkout_fails_only_on_construction() {
    let (driver, pool) = setup();

    driver.fail_connects(true);
    assert!(matches!(
        pool.checkout(),
        Err(Error::ConnectFailed { .. })
    ));

    driver.fail_connects(false);
    drop(pool.checkout().unwrap());

    // An idle connection is handed out as-is, even when the factory
    // would currently fail
    driver.fail_connects(true);
    assert!(pool.checkout().is_ok());
}

#[test]
fn concurrent_leases_are_exclusive() {
    let (driver, pool) = setup();

    let a = pool.checkout().unwrap();
    let b = pool.checkout().unwrap();
    assert_eq!(driver.connect_count(), 2);

    drop(a);
    drop(b);
    assert_eq!(pool.idle_count(), 2);

    let _a = pool.checkout().unwrap();
    let _b = pool.checkout().unwrap();
    assert_eq!(driver.connect_count(), 2);
}

#[test]
fn pool_execute_convenience() {
    let (driver, pool) = setup();

    pool.execute("CREATE TABLE t", &[]).unwrap();
    pool.execute("INSERT INTO t VALUES", &[&1i64]).unwrap();

    assert_eq!(driver.committed_rows("t"), Some(1));
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn pooled_connection_runs_transactions() {
    let (driver, pool) = setup();
    pool.execute("CREATE TABLE t", &[]).unwrap();

    let conn = pool.checkout().unwrap();
    let tx = conn.transaction(IsolationLevel::Serializable).unwrap();
    tx.execute("INSERT INTO t VALUES", &[&1i64]).unwrap();
    tx.commit().unwrap();
    drop(conn);

    assert_eq!(driver.committed_rows("t"), Some(1));
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn detached_connection_skips_return() {
    let (driver, pool) = setup();

    let lease = pool.checkout().unwrap();
    let conn = lease.detach();
    assert_eq!(pool.idle_count(), 0);
    assert!(conn.is_open());

    let _second = pool.checkout().unwrap();
    assert_eq!(driver.connect_count(), 2);
}

#[test]
fn concurrent_checkout_from_threads() {
    let (driver, pool) = setup();
    pool.execute("CREATE TABLE t", &[]).unwrap();

    let threads: Vec<_> = (0..8i64)
        .map(|i| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for j in 0..5i64 {
                    pool.execute("INSERT INTO t VALUES", &[&i, &j]).unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(driver.committed_rows("t"), Some(40));
    assert!(driver.connect_count() <= 8);
    assert_eq!(pool.idle_count() as u64, driver.connect_count());
}
