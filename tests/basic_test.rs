// Copyright 2020 Joyent, Inc.

use std::io::{Error as IOError, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use slog::{o, Drain, Logger};

use pinball::connection::{Connection, ConnectionOptions, ThreadId};
use pinball::connection_pool::types::ConnectionPoolOptions;
use pinball::connection_pool::ConnectionPool;
use pinball::endpoint::{Address, Endpoint};
use pinball::error::Error;

static NEXT_CONNECTION_ID: AtomicUsize = AtomicUsize::new(0);

// A connection that dials nothing. Each instance gets a process-wide unique
// id so tests can assert on connection identity across checkouts.
#[derive(Debug)]
pub struct DummyConnection {
    id: usize,
    address: Address,
    pinned_to: Option<ThreadId>,
}

impl Connection for DummyConnection {
    type Error = IOError;

    fn open(
        endpoint: &Endpoint,
        _options: &ConnectionOptions,
    ) -> Result<Self, Self::Error> {
        Ok(DummyConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            address: endpoint.address.clone(),
            pinned_to: None,
        })
    }

    fn address(&self) -> &Address {
        &self.address
    }

    fn pinned_to(&self) -> Option<ThreadId> {
        self.pinned_to
    }

    fn pin_to(&mut self, owner: ThreadId) {
        self.pinned_to = Some(owner);
    }

    fn unpin(&mut self) {
        self.pinned_to = None;
    }
}

// A connection whose open always fails.
#[derive(Debug)]
pub struct FailingConnection;

impl Connection for FailingConnection {
    type Error = IOError;

    fn open(
        _endpoint: &Endpoint,
        _options: &ConnectionOptions,
    ) -> Result<Self, Self::Error> {
        Err(IOError::new(ErrorKind::ConnectionRefused, "refused"))
    }

    fn address(&self) -> &Address {
        unreachable!()
    }

    fn pinned_to(&self) -> Option<ThreadId> {
        unreachable!()
    }

    fn pin_to(&mut self, _owner: ThreadId) {
        unreachable!()
    }

    fn unpin(&mut self) {
        unreachable!()
    }
}

fn pool_with_max_size(max_size: u32) -> ConnectionPool<DummyConnection> {
    ConnectionPool::new(ConnectionPoolOptions {
        max_size: Some(max_size),
        connection_timeout: None,
        log: None,
    })
}

#[test]
fn fresh_checkout() {
    let pool = pool_with_max_size(2);
    let address = Address::from("127.0.0.1:27017");

    let conn = pool
        .checkout(ThreadId::from(42), &address, None)
        .expect("checkout from an empty pool should create a connection");

    assert_eq!(conn.address(), &address);
    assert_eq!(conn.pinned_to(), Some(ThreadId::from(42)));
    assert_eq!(pool.stats().instantiated_connections, 1.into());
    assert!(!pool.saturated());
}

#[test]
fn saturated_checkout_fails_after_deadline() {
    let pool = pool_with_max_size(2);
    let address = Address::from("127.0.0.1:27017");
    let tid = ThreadId::from(42);

    let _c1 = pool.checkout(tid, &address, None).unwrap();
    let _c2 = pool.checkout(tid, &address, None).unwrap();
    assert!(pool.saturated());

    let start = Instant::now();
    let result =
        pool.checkout(tid, &address, Some(Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(50));
    match result {
        Err(Error::MaxReached) => (),
        other => panic!("expected MaxReached, got {:?}", other),
    }
    // The failed checkout left the pool untouched.
    assert_eq!(pool.stats().instantiated_connections, 2.into());
}

#[test]
fn checkin_wakes_blocked_checkout() {
    let pool = pool_with_max_size(2);
    let address = Address::from("127.0.0.1:27017");
    let tid = ThreadId::from(42);

    let c1 = pool.checkout(tid, &address, None).unwrap();
    let _c2 = pool.checkout(tid, &address, None).unwrap();
    let c1_id = c1.id;

    let barrier = Arc::new(Barrier::new(2));
    let barrier_clone = barrier.clone();
    let pool_clone = pool.clone();
    let address_clone = address.clone();
    let waiter = thread::spawn(move || {
        barrier_clone.wait();
        pool_clone
            .checkout(tid, &address_clone, Some(Duration::from_millis(1500)))
            .expect("checkout should be woken by the checkin")
    });

    barrier.wait();
    // Give the waiter time to reach the condition variable before the
    // checkin broadcasts.
    thread::sleep(Duration::from_millis(200));
    pool.checkin(c1);

    let woken = waiter.join().unwrap();
    assert_eq!(woken.id, c1_id);
    assert_eq!(woken.pinned_to(), Some(tid));
}

#[test]
fn checkout_has_thread_affinity() {
    let pool = pool_with_max_size(5);
    let address = Address::from("127.0.0.1:27017");
    let endpoint = Endpoint::new("127.0.0.1", 27017);
    let options = ConnectionOptions {
        timeout: Some(Duration::from_secs(5)),
    };

    let mut conn = DummyConnection::open(&endpoint, &options).unwrap();
    let conn_id = conn.id;
    conn.pin_to(ThreadId::from(42));
    pool.checkin(conn);

    let conn = pool.checkout(ThreadId::from(42), &address, None).unwrap();
    assert_eq!(conn.id, conn_id);
    assert_eq!(conn.pinned_to(), Some(ThreadId::from(42)));
}

#[test]
fn unpin_reassigns_to_another_thread() {
    let pool = pool_with_max_size(5);
    let address = Address::from("127.0.0.1:27017");
    let endpoint = Endpoint::new("127.0.0.1", 27017);
    let options = ConnectionOptions {
        timeout: Some(Duration::from_secs(5)),
    };

    let mut conn = DummyConnection::open(&endpoint, &options).unwrap();
    let conn_id = conn.id;
    conn.pin_to(ThreadId::from(42));
    pool.checkin(conn);

    pool.unpin_connections(ThreadId::from(42));
    let stats = pool.stats();
    assert_eq!(stats.pinned_connections, 0.into());
    assert_eq!(stats.unpinned_connections, 1.into());

    let conn = pool.checkout(ThreadId::from(99), &address, None).unwrap();
    assert_eq!(conn.id, conn_id);
    assert_eq!(conn.pinned_to(), Some(ThreadId::from(99)));
}

#[test]
fn default_max_size() {
    let pool: ConnectionPool<DummyConnection> =
        ConnectionPool::new(ConnectionPoolOptions {
            max_size: None,
            connection_timeout: None,
            log: None,
        });
    assert_eq!(pool.max_size(), 5);

    let pool = pool_with_max_size(10);
    assert_eq!(pool.max_size(), 10);
}

#[test]
fn checkout_checkin_checkout_returns_same_connection() {
    let pool = pool_with_max_size(2);
    let address = Address::from("127.0.0.1:27017");
    let tid = ThreadId::from(42);

    let conn = pool.checkout(tid, &address, None).unwrap();
    let conn_id = conn.id;
    pool.checkin(conn);

    let conn = pool.checkout(tid, &address, None).unwrap();
    assert_eq!(conn.id, conn_id);
    assert_eq!(conn.pinned_to(), Some(tid));
    assert_eq!(pool.stats().instantiated_connections, 1.into());
}

#[test]
fn promotion_takes_most_recently_unpinned() {
    let pool = pool_with_max_size(2);
    let address = Address::from("127.0.0.1:27017");
    let t1 = ThreadId::from(1);
    let t2 = ThreadId::from(2);

    let c1 = pool.checkout(t1, &address, None).unwrap();
    let c2 = pool.checkout(t2, &address, None).unwrap();
    let c2_id = c2.id;
    pool.checkin(c1);
    pool.checkin(c2);

    // Unpinning t1 first and t2 second leaves t2's connection on top of the
    // unpinned list.
    pool.unpin_connections(t1).unpin_connections(t2);

    let conn = pool.checkout(ThreadId::from(3), &address, None).unwrap();
    assert_eq!(conn.id, c2_id);
    assert_eq!(conn.pinned_to(), Some(ThreadId::from(3)));
}

#[test]
fn pinless_checkin_is_parked_unpinned() {
    let pool = pool_with_max_size(5);
    let address = Address::from("127.0.0.1:27017");
    let endpoint = Endpoint::new("127.0.0.1", 27017);

    let conn =
        DummyConnection::open(&endpoint, &ConnectionOptions::default())
            .unwrap();
    let conn_id = conn.id;
    pool.checkin(conn);

    let stats = pool.stats();
    assert_eq!(stats.pinned_connections, 0.into());
    assert_eq!(stats.unpinned_connections, 1.into());

    let conn = pool.checkout(ThreadId::from(7), &address, None).unwrap();
    assert_eq!(conn.id, conn_id);
    assert_eq!(conn.pinned_to(), Some(ThreadId::from(7)));
}

#[test]
fn open_failure_leaves_counter_untouched() {
    let pool: ConnectionPool<FailingConnection> =
        ConnectionPool::new(ConnectionPoolOptions {
            max_size: Some(2),
            connection_timeout: None,
            log: None,
        });
    let address = Address::from("127.0.0.1:27017");

    let result = pool.checkout(ThreadId::from(42), &address, None);
    match result {
        Err(Error::Connect(_)) => (),
        other => panic!("expected Connect error, got {:?}", other),
    }
    assert_eq!(pool.stats().instantiated_connections, 0.into());
    assert!(!pool.saturated());
}

#[test]
fn invalid_address_is_rejected() {
    let pool = pool_with_max_size(2);
    let tid = ThreadId::from(42);

    match pool.checkout(tid, &Address::from("no-port"), None) {
        Err(Error::InvalidAddress(_)) => (),
        other => panic!("expected InvalidAddress, got {:?}", other),
    }
    match pool.checkout(tid, &Address::from("host:notaport"), None) {
        Err(Error::InvalidAddress(_)) => (),
        other => panic!("expected InvalidAddress, got {:?}", other),
    }
    assert_eq!(pool.stats().instantiated_connections, 0.into());
}

#[test]
fn capacity_is_shared_across_addresses() {
    let pool = pool_with_max_size(2);
    let a1 = Address::from("127.0.0.1:27017");
    let a2 = Address::from("127.0.0.1:27018");
    let tid = ThreadId::from(42);

    let c1 = pool.checkout(tid, &a1, None).unwrap();
    let _c2 = pool.checkout(tid, &a2, None).unwrap();
    assert!(pool.saturated());

    // A third address has no resident connections and no capacity left.
    let result = pool.checkout(
        tid,
        &Address::from("127.0.0.1:27019"),
        Some(Duration::from_millis(10)),
    );
    match result {
        Err(Error::MaxReached) => (),
        other => panic!("expected MaxReached, got {:?}", other),
    }

    // A saturated pool still serves resident pinned connections.
    let c1_id = c1.id;
    pool.checkin(c1);
    let conn = pool.checkout(tid, &a1, None).unwrap();
    assert_eq!(conn.id, c1_id);
}

#[test]
fn unpin_sweeps_every_address() {
    let pool = pool_with_max_size(5);
    let a1 = Address::from("127.0.0.1:27017");
    let a2 = Address::from("10.0.0.1:27017");
    let tid = ThreadId::from(42);

    let c1 = pool.checkout(tid, &a1, None).unwrap();
    let c2 = pool.checkout(tid, &a2, None).unwrap();
    pool.checkin(c1);
    pool.checkin(c2);
    assert_eq!(pool.stats().pinned_connections, 2.into());

    pool.unpin_connections(tid);
    let stats = pool.stats();
    assert_eq!(stats.pinned_connections, 0.into());
    assert_eq!(stats.unpinned_connections, 2.into());

    let t9 = ThreadId::from(9);
    let conn = pool.checkout(t9, &a1, None).unwrap();
    assert_eq!(conn.address(), &a1);
    assert_eq!(conn.pinned_to(), Some(t9));
    let conn = pool.checkout(t9, &a2, None).unwrap();
    assert_eq!(conn.address(), &a2);
    assert_eq!(conn.pinned_to(), Some(t9));

    // Both checkouts were promotions, not fresh connections.
    assert_eq!(pool.stats().instantiated_connections, 2.into());
}

#[test]
fn pool_with_explicit_logger() {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let log = Logger::root(
        Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
        o!("build-id" => "0.1.0"),
    );

    let pool: ConnectionPool<DummyConnection> =
        ConnectionPool::new(ConnectionPoolOptions {
            max_size: Some(3),
            connection_timeout: None,
            log: Some(log),
        });
    let address = Address::from("127.0.0.1:27017");
    let tid = ThreadId::from(42);

    let conn = pool.checkout(tid, &address, None).unwrap();
    pool.checkin(conn);
    assert_eq!(pool.stats().instantiated_connections, 1.into());
    assert_eq!(pool.stats().pinned_connections, 1.into());
}
