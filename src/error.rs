/*
 * Copyright 2020 Joyent, Inc.
 */

use std::error;
use std::fmt;

/// The errors surfaced by a connection pool checkout. The type is generic
/// over the connection implementation's own error type so that a failure to
/// open a connection can be propagated without boxing.
#[derive(Debug)]
pub enum Error<E> {
    /// The pool was saturated and no connection became available for the
    /// requesting thread before the checkout deadline passed.
    MaxReached,
    /// The requested address did not parse as `"host:port"`.
    InvalidAddress(String),
    /// Opening a new connection failed. The pool's capacity counter is not
    /// incremented when this is returned.
    Connect(E),
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Display,
{
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MaxReached => "connection pool max size reached".fmt(fmt),
            Error::InvalidAddress(address) => {
                write!(fmt, "invalid address: {}", address)
            }
            Error::Connect(err) => err.fmt(fmt),
        }
    }
}

impl<E> error::Error for Error<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connect(err) => Some(err),
            _ => None,
        }
    }
}
