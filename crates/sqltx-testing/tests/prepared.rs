//! Prepared statement registration and routing.

use sqltx_client::{Config, Connection, Error, IsolationLevel};
use sqltx_testing::MockDriver;

fn setup() -> (MockDriver, Connection) {
    sqltx_testing::init_tracing();
    let driver = MockDriver::new();
    let conn = Connection::open(&driver, &Config::new()).unwrap();
    conn.execute("CREATE TABLE t", &[]).unwrap();
    (driver, conn)
}

#[test]
fn prepared_statement_executes_by_name() {
    let (driver, conn) = setup();

    conn.prepare("ins", "INSERT INTO t VALUES").unwrap();
    conn.execute("ins", &[&1i64]).unwrap();
    assert_eq!(driver.committed_rows("t"), Some(1));

    // The name routes inside transactions too
    let tx = conn.transaction(IsolationLevel::Default).unwrap();
    tx.execute("ins", &[&2i64]).unwrap();
    tx.commit().unwrap();
    assert_eq!(driver.committed_rows("t"), Some(2));
}

#[test]
fn re_preparing_identical_text_is_noop() {
    let (_driver, conn) = setup();

    conn.prepare("ins", "INSERT INTO t VALUES").unwrap();
    conn.prepare("ins", "INSERT INTO t VALUES").unwrap();
}

#[test]
fn re_preparing_different_text_is_driver_defined() {
    let (_driver, conn) = setup();

    conn.prepare("ins", "INSERT INTO t VALUES").unwrap();
    // This driver rejects name reuse; the layer forwards its verdict
    assert!(matches!(
        conn.prepare("ins", "SELECT * FROM t"),
        Err(Error::Driver(_))
    ));
}

#[test]
fn invalid_names_are_rejected() {
    let (_driver, conn) = setup();

    for name in ["", "has space", "1leading", "semi;colon"] {
        assert!(matches!(
            conn.prepare(name, "SELECT * FROM t"),
            Err(Error::InvalidName(_))
        ));
    }
}

#[test]
fn deallocate_unknown_name_fails() {
    let (_driver, conn) = setup();

    assert!(matches!(
        conn.deallocate("nope"),
        Err(Error::UnknownStatement(_))
    ));
}

#[test]
fn deallocated_name_no_longer_routes() {
    let (_driver, conn) = setup();

    conn.prepare("q", "SELECT * FROM t").unwrap();
    assert!(conn.execute("q", &[]).is_ok());

    conn.deallocate("q").unwrap();
    // The bare name is now just SQL text the driver does not understand
    assert!(matches!(conn.execute("q", &[]), Err(Error::Driver(_))));
}
