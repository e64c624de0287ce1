// Copyright 2020 Joyent, Inc.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use derive_more::{Add, AddAssign, Display, From, Into, Sub, SubAssign};
use slog::Logger;

use crate::connection::Connection;
use crate::connection_pool::pinning::ConnectionIndex;

/// The connection counts for the connection pool
#[derive(Copy, Clone, Debug)]
pub struct ConnectionPoolStats {
    /// The total number of connections created by the pool. The count is
    /// never decremented; connections are returned via checkin, not
    /// destroyed by the pool.
    pub instantiated_connections: ConnectionCount,
    /// The count of resident connections currently pinned to a thread.
    pub pinned_connections: ConnectionCount,
    /// The count of resident connections currently bearing no pin.
    pub unpinned_connections: ConnectionCount,
}

/// The configuration options for a pinball connection pool. This is required
/// to instantiate a new connection pool.
#[derive(Debug, Default)]
pub struct ConnectionPoolOptions {
    /// An optional maximum number of connections for the pool to create. If
    /// not specified the default is 5.
    pub max_size: Option<u32>,
    /// An optional I/O timeout forwarded to `Connection::open` whenever the
    /// pool establishes a new connection. If not specified no timeout is
    /// applied.
    pub connection_timeout: Option<Duration>,
    /// An optional `slog` logger instance. If none is provided then the
    /// logging will fall back to using the
    /// [`slog-stdlog`](https://docs.rs/slog-stdlog) drain which is
    /// essentially the same as using the rust standard
    /// [`log`](https://docs.rs/log) crate.
    pub log: Option<Logger>,
}

/// A newtype wrapper around u32 used for counts of connections maintained by
/// the connection pool.
#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Into,
    Ord,
    PartialOrd,
    PartialEq,
    Sub,
    SubAssign,
)]
pub struct ConnectionCount(u32);

// The internal data structures used to manage the connection pool.
#[doc(hidden)]
#[derive(Debug)]
pub struct ConnectionData<C> {
    pub index: ConnectionIndex<C>,
    pub instantiated: ConnectionCount,
}

impl<C> ConnectionData<C>
where
    C: Connection,
{
    #[doc(hidden)]
    pub fn new() -> Self {
        ConnectionData {
            index: ConnectionIndex::new(),
            instantiated: ConnectionCount::from(0),
        }
    }
}

// Protected access to the internal connection pool data structures
#[doc(hidden)]
#[derive(Debug)]
pub struct ProtectedData<C>(Arc<(Mutex<ConnectionData<C>>, Condvar)>);

impl<C> ProtectedData<C>
where
    C: Connection,
{
    pub fn new(connection_data: ConnectionData<C>) -> Self {
        ProtectedData(Arc::new((Mutex::new(connection_data), Condvar::new())))
    }

    pub fn connection_data_lock(&self) -> MutexGuard<ConnectionData<C>> {
        (self.0).0.lock().unwrap()
    }

    /// Atomically release the lock and block until a broadcast arrives or
    /// `timeout` elapses, reacquiring the lock before returning. The second
    /// member of the returned pair is true if the wait timed out.
    pub fn condvar_wait<'a>(
        &self,
        g: MutexGuard<'a, ConnectionData<C>>,
        timeout: Duration,
    ) -> (MutexGuard<'a, ConnectionData<C>>, bool) {
        let wait_result = (self.0).1.wait_timeout(g, timeout).unwrap();
        (wait_result.0, wait_result.1.timed_out())
    }

    /// Wake every checkout waiter. Wake-one is insufficient here: a waiter
    /// may want a different address than the one just checked in, so all
    /// waiters are woken and each re-checks its own condition.
    pub fn condvar_broadcast(&self) {
        (self.0).1.notify_all()
    }
}

impl<C> Clone for ProtectedData<C>
where
    C: Connection,
{
    fn clone(&self) -> ProtectedData<C> {
        ProtectedData(Arc::clone(&self.0))
    }
}
