// Copyright 2020 Joyent, Inc.

pub mod pinning;
pub mod types;

use std::time::{Duration, Instant};

use slog::{debug, o, trace, warn, Drain, Logger};

use crate::connection::{Connection, ConnectionOptions, ThreadId};
use crate::connection_pool::types::{
    ConnectionCount, ConnectionData, ConnectionPoolOptions,
    ConnectionPoolStats, ProtectedData,
};
use crate::endpoint::{Address, Endpoint};
use crate::error::Error;

// Default number of maximum pool connections
const DEFAULT_MAX_SIZE: u32 = 5;
// Default deadline for a blocking checkout
const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_millis(250);

/// A bounded pool of connections to a single address namespace, with
/// connections pinned to the threads that use them.
///
/// One mutex protects the whole pool: the per-address pinnings and the
/// instantiated count. Every public operation acquires it on entry and holds
/// it until return, apart from the condition variable wait inside a blocked
/// [`checkout`](ConnectionPool::checkout).
#[derive(Debug)]
pub struct ConnectionPool<C>
where
    C: Connection,
{
    protected_data: ProtectedData<C>,
    max_size: u32,
    connection_options: ConnectionOptions,
    log: Logger,
}

impl<C> Clone for ConnectionPool<C>
where
    C: Connection,
{
    fn clone(&self) -> ConnectionPool<C> {
        ConnectionPool {
            protected_data: self.protected_data.clone(),
            max_size: self.max_size,
            connection_options: self.connection_options.clone(),
            log: self.log.clone(),
        }
    }
}

impl<C> ConnectionPool<C>
where
    C: Connection,
{
    pub fn new(cpo: ConnectionPoolOptions) -> Self {
        // max_size is specified positive; clamp a configured zero rather
        // than create a pool that can never open a connection.
        let max_size = cpo.max_size.unwrap_or(DEFAULT_MAX_SIZE).max(1);

        let logger = cpo
            .log
            .unwrap_or_else(|| Logger::root(slog_stdlog::StdLog.fuse(), o!()));

        let protected_data = ProtectedData::new(ConnectionData::new());

        ConnectionPool {
            protected_data,
            max_size,
            connection_options: ConnectionOptions {
                timeout: cpo.connection_timeout,
            },
            log: logger,
        }
    }

    /// The maximum number of connections the pool will create, resolved from
    /// the construction options.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Whether the pool has created its maximum number of connections.
    ///
    /// The internal call sites read this under the pool mutex; for external
    /// callers the value is a hint that may be stale by the time it is
    /// observed.
    pub fn saturated(&self) -> bool {
        let connection_data = self.protected_data.connection_data_lock();
        connection_data.instantiated >= ConnectionCount::from(self.max_size)
    }

    /// Take possession of a connection to `address` for `thread_id`.
    ///
    /// The connection already pinned to `thread_id` is preferred; failing
    /// that, the most recently unpinned resident connection for the address
    /// is repinned and handed over; failing that, a new connection is opened
    /// as long as the pool is below its maximum size. When the pool is
    /// saturated and nothing is resident for this thread, the call blocks
    /// until a checkin makes a connection available or the deadline passes,
    /// whichever comes first. `timeout` defaults to 250 milliseconds and the
    /// deadline is fixed on entry.
    ///
    /// The returned connection is owned by the caller until it is handed
    /// back with [`checkin`](ConnectionPool::checkin). A connection that is
    /// never checked back in permanently consumes one of the pool's capacity
    /// slots; the pool has no reclamation mechanism.
    ///
    /// Errors: [`Error::MaxReached`] when the deadline passes without a
    /// connection; [`Error::InvalidAddress`] when `address` does not parse
    /// as `"host:port"`; [`Error::Connect`] when opening a new connection
    /// fails (the instantiated count is not bumped in that case).
    pub fn checkout(
        &self,
        thread_id: ThreadId,
        address: &Address,
        timeout: Option<Duration>,
    ) -> Result<C, Error<C::Error>> {
        let deadline =
            Instant::now() + timeout.unwrap_or(DEFAULT_CHECKOUT_TIMEOUT);
        let mut connection_data = self.protected_data.connection_data_lock();

        loop {
            if let Some(conn) =
                connection_data.index.get(address).get(thread_id)
            {
                trace!(
                    self.log,
                    "handing resident connection for {} to thread {}",
                    address,
                    thread_id
                );
                return Ok(conn);
            }

            if connection_data.instantiated
                < ConnectionCount::from(self.max_size)
            {
                let endpoint = Endpoint::parse(address).ok_or_else(|| {
                    Error::InvalidAddress(address.to_string())
                })?;
                // Establishment happens inside the critical section. It
                // serializes slow dials, and it is what keeps the
                // instantiated count from ever overrunning max_size. The
                // count is bumped only after a successful open.
                let mut conn = C::open(&endpoint, &self.connection_options)
                    .map_err(Error::Connect)?;
                connection_data.instantiated += ConnectionCount::from(1);
                conn.pin_to(thread_id);
                debug!(
                    self.log,
                    "established connection to {} for thread {}",
                    address,
                    thread_id
                );
                // The new connection is handed straight to the caller; it
                // only becomes resident in the pinning at checkin.
                return Ok(conn);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(
                    self.log,
                    "checkout deadline passed for thread {} on {}",
                    thread_id,
                    address
                );
                return Err(Error::MaxReached);
            }
            let wait = deadline - now;
            trace!(
                self.log,
                "pool saturated, thread {} waiting up to {:?} for {}",
                thread_id,
                wait,
                address
            );
            // Checkins broadcast to every waiter regardless of address, and
            // a woken waiter may lose the race for the connection it wanted,
            // so the result of the wait is ignored and the full condition is
            // re-checked at the top of the loop.
            let wait_result =
                self.protected_data.condvar_wait(connection_data, wait);
            connection_data = wait_result.0;
        }
    }

    /// Return `connection` to the pool, making it resident under its current
    /// pin, and wake every blocked checkout. Callers must not use the
    /// connection after checking it in.
    ///
    /// The connection is expected to carry the pin it was checked out with.
    /// One checked in with no pin is parked on the address's unpinned list
    /// rather than dropped, so the capacity slot it occupies stays usable.
    pub fn checkin(&self, connection: C) -> &Self {
        let mut connection_data = self.protected_data.connection_data_lock();
        let address = connection.address().clone();
        match connection.pinned_to() {
            Some(owner) => trace!(
                self.log,
                "connection for {} checked in by thread {}",
                address,
                owner
            ),
            None => warn!(
                self.log,
                "connection for {} checked in with no pin", address
            ),
        }
        connection_data.index.get(&address).set(connection);
        self.protected_data.condvar_broadcast();
        self
    }

    /// Transfer every connection currently pinned to `thread_id`, across all
    /// addresses, onto the unpinned lists and clear their pins. Connections
    /// the thread has checked out are unaffected.
    ///
    /// No broadcast is performed; a blocked checkout is only woken by the
    /// next checkin or its own deadline.
    pub fn unpin_connections(&self, thread_id: ThreadId) -> &Self {
        let mut connection_data = self.protected_data.connection_data_lock();
        debug!(self.log, "unpinning connections for thread {}", thread_id);
        connection_data.index.unpin(thread_id);
        self
    }

    /// A snapshot of the pool's connection counts, read under the mutex.
    pub fn stats(&self) -> ConnectionPoolStats {
        let connection_data = self.protected_data.connection_data_lock();
        let mut pinned = 0u32;
        let mut unpinned = 0u32;
        connection_data.index.pinnings().for_each(|pinning| {
            pinned += pinning.pinned_count() as u32;
            unpinned += pinning.unpinned_count() as u32;
        });
        ConnectionPoolStats {
            instantiated_connections: connection_data.instantiated,
            pinned_connections: ConnectionCount::from(pinned),
            unpinned_connections: ConnectionCount::from(unpinned),
        }
    }
}
