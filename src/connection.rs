// Copyright 2020 Joyent, Inc.

use std::error;
use std::time::Duration;

use derive_more::{Display, From, Into};

use crate::endpoint::{Address, Endpoint};

/// The logical owner of a pinned connection.
///
/// This is an opaque comparable token supplied by the caller on each
/// checkout. It is normally derived from the calling thread, but any stable
/// per-task identifier works; the pool never inspects the value beyond
/// comparing it for equality.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialOrd,
    PartialEq,
)]
pub struct ThreadId(u64);

/// Options forwarded to [`Connection::open`] when the pool establishes a new
/// connection. The pool freezes these at construction time.
#[derive(Clone, Debug, Default)]
pub struct ConnectionOptions {
    /// An optional I/O timeout applied when dialing the remote endpoint.
    pub timeout: Option<Duration>,
}

/// Pinball connection
///
/// The `Connection` trait defines the interface that must be implemented in
/// order to participate in a pinball connection pool. A connection need not
/// be limited to a TCP socket, but could be any logical notion of a
/// connection to a remote endpoint, as long as it can report the
/// `"host:port"` address it was opened against and carry a pin.
///
/// The pin is plain mutable state on the connection; `pin_to` and `unpin` do
/// not synchronize with the pool. The pool holds its own lock whenever it
/// calls them, and callers must not touch the pin of a connection they have
/// checked out.
pub trait Connection: Send + Sized + 'static {
    /// The error type returned by the `open` function. This is an associated
    /// type for the trait meaning each specific implementation of the
    /// `Connection` trait may choose the appropriate concrete error type to
    /// return. The only constraint applied is that the selected error type
    /// must implement the
    /// [Error](https://doc.rust-lang.org/std/error/trait.Error.html) trait
    /// from the standard library. This allows for the error to be relevant to
    /// the context of the `Connection` implementation while avoiding
    /// unnecessary type parameters or having to coerce data between
    /// incompatible error types.
    type Error: error::Error;

    /// Attempt to establish a connection to the given endpoint. The pool
    /// invokes this inside its critical section when a checkout finds no
    /// suitable resident connection and the pool is below its maximum size.
    /// A failure propagates out of the checkout before the pool's capacity
    /// counter is incremented.
    fn open(
        endpoint: &Endpoint,
        options: &ConnectionOptions,
    ) -> Result<Self, Self::Error>;

    /// The `"host:port"` address this connection was opened against. The
    /// address is immutable for the life of the connection; the pool routes
    /// checkins with it.
    fn address(&self) -> &Address;

    /// The thread this connection is currently pinned to, if any.
    fn pinned_to(&self) -> Option<ThreadId>;

    /// Pin the connection to `owner`.
    fn pin_to(&mut self, owner: ThreadId);

    /// Clear the pin.
    fn unpin(&mut self);
}
