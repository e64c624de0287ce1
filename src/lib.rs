// Copyright 2020 Joyent, Inc.

//! A per-address, thread-pinned connection pool
//!
//! Pinball manages a bounded set of connections to a remote endpoint on
//! behalf of a database driver, amortizing the cost of establishing TCP
//! connections. Rather than treating connections as interchangeable, the
//! pool gives each connection *affinity* to the logical thread that uses it:
//! a thread that checks a connection in and asks again later gets the same
//! connection back.
//!
//! ## Pinning
//!
//! Each address the pool has seen owns a *pinning*: a record of which
//! resident connections are pinned to which threads, plus a last-in
//! first-out list of resident connections that currently bear no pin. A
//! checkout for a given thread first looks for that thread's own connection,
//! then falls back to repinning the most recently unpinned one, and only
//! then asks the pool to open a new connection. Keeping the unpinned list
//! LIFO keeps hot connections warm.
//!
//! A connection's pin travels with the connection itself (see the
//! [`Connection`](connection/trait.Connection.html) trait): the pool sets it
//! under its own lock, and a checkin files the returned connection under
//! whatever pin it carries.
//!
//! ## Checkout and checkin
//!
//! The pool bounds the total number of connections it will create with
//! `max_size` (default 5). The count of created connections only ever goes
//! up; the pool returns connections to its pinnings at checkin, it never
//! destroys them. When the pool is saturated and a checkout finds nothing
//! resident for its thread, the caller blocks on the pool's condition
//! variable until a checkin broadcasts or the checkout deadline passes, at
//! which point the checkout fails with
//! [`Error::MaxReached`](error/enum.Error.html). Every checkin wakes every
//! waiter: a wakeup is only a hint, and each waiter re-checks the pinning
//! for its own address before either returning or going back to sleep.
//!
//! Checked-out connections are owned by the caller. A caller that never
//! checks its connection back in (for example a thread that dies mid
//! request) permanently consumes one capacity slot.
//!
//! ## Connections
//!
//! A pinball *connection* is not necessarily just a TCP socket. Anything
//! that can dial a `"host:port"` endpoint and carry a pin can implement the
//! [`Connection`](connection/trait.Connection.html) trait; a
//! [`TcpStreamConnection`](tcp_stream/struct.TcpStreamConnection.html)
//! implementation over `std::net::TcpStream` is provided.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use pinball::connection::ThreadId;
//! use pinball::connection_pool::types::ConnectionPoolOptions;
//! use pinball::connection_pool::ConnectionPool;
//! use pinball::endpoint::Address;
//! use pinball::tcp_stream::TcpStreamConnection;
//!
//! let pool = ConnectionPool::<TcpStreamConnection>::new(
//!     ConnectionPoolOptions {
//!         max_size: Some(5),
//!         connection_timeout: Some(Duration::from_secs(5)),
//!         log: None,
//!     },
//! );
//!
//! let address = Address::from("127.0.0.1:27017");
//! let thread_id = ThreadId::from(42);
//!
//! let conn = pool.checkout(thread_id, &address, None)?;
//! // ... use the connection ...
//! pool.checkin(conn);
//!
//! // Hand the thread's connections over to whoever asks next.
//! pool.unpin_connections(thread_id);
//! ```

#![allow(missing_docs)]

pub mod connection;
pub mod connection_pool;
pub mod endpoint;
pub mod error;
pub mod tcp_stream;
