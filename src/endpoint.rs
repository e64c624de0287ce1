// Copyright 2020 Joyent, Inc.

use derive_more::{Display, From, Into};

/// The `"host:port"` string identifying a remote endpoint. Addresses are
/// compared as raw strings; no normalization is performed, so
/// `"localhost:27017"` and `"127.0.0.1:27017"` are distinct keys.
#[derive(
    Clone, Debug, Display, Eq, From, Hash, Into, Ord, PartialOrd, PartialEq,
)]
pub struct Address(String);

impl<'a> From<&'a str> for Address {
    fn from(s: &'a str) -> Self {
        Address(s.to_string())
    }
}

impl Address {
    /// View the address as a raw string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The port number for an endpoint. This is a type alias for u16.
pub type Port = u16;

/// The parsed form of an [`Address`], used when opening a new connection.
#[derive(Clone, Debug)]
pub struct Endpoint {
    /// The concatenation of the endpoint host and port with a colon delimiter.
    pub address: Address,
    /// The host portion of the address.
    pub host: String,
    /// The port portion of the address.
    pub port: Port,
}

impl Endpoint {
    /// Return a new instance of `Endpoint` given a host and a port.
    pub fn new(host: &str, port: Port) -> Self {
        Endpoint {
            address: endpoint_address(host, port),
            host: String::from(host),
            port,
        }
    }

    /// Parse an address of the form `"host:port"`. The address is split on
    /// the first `:`; the prefix is the host and the suffix must be a base-10
    /// port number.
    pub fn parse(address: &Address) -> Option<Self> {
        let (host, port) = address.0.split_once(':')?;
        let port = port.parse::<Port>().ok()?;
        Some(Endpoint {
            address: address.clone(),
            host: String::from(host),
            port,
        })
    }
}

// Concatenate the endpoint host and port with a colon delimiter.
fn endpoint_address(host: &str, port: Port) -> Address {
    [String::from(host), String::from(":"), port.to_string()]
        .concat()
        .into()
}
