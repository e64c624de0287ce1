// Copyright 2020 Joyent, Inc.

use std::io::{Error as IOError, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};

use crate::connection::{Connection, ConnectionOptions, ThreadId};
use crate::endpoint::{Address, Endpoint};

/// A [`Connection`] implementation over a plain TCP stream. The configured
/// I/O timeout, when present, bounds the dial.
#[derive(Debug)]
pub struct TcpStreamConnection {
    pub stream: TcpStream,
    address: Address,
    pinned_to: Option<ThreadId>,
}

fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, IOError> {
    (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            IOError::new(
                ErrorKind::AddrNotAvailable,
                format!("no socket address for {}", endpoint.address),
            )
        })
}

impl Connection for TcpStreamConnection {
    type Error = IOError;

    fn open(
        endpoint: &Endpoint,
        options: &ConnectionOptions,
    ) -> Result<Self, Self::Error> {
        let addr = resolve(endpoint)?;
        let stream = match options.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(&addr)?,
        };
        Ok(TcpStreamConnection {
            stream,
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

impl Deref for TcpStreamConnection {
    type Target = TcpStream;

    fn deref(&self) -> &TcpStream {
        &self.stream
    }
}

impl DerefMut for TcpStreamConnection {
    fn deref_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}
