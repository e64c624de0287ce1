// Copyright 2020 Joyent, Inc.

use std::collections::HashMap;

use crate::connection::{Connection, ThreadId};
use crate::endpoint::Address;

// Per-address bookkeeping of which resident connections are pinned to which
// threads and which resident connections currently bear no pin. Every
// operation here runs with the pool mutex held; `Pinning` carries no lock of
// its own. A connection lives in at most one of the two containers at any
// time, or with the caller that checked it out.
#[doc(hidden)]
#[derive(Debug)]
pub struct Pinning<C> {
    threads: HashMap<ThreadId, C>,
    unpinned: Vec<C>,
}

impl<C> Pinning<C>
where
    C: Connection,
{
    pub fn new() -> Self {
        Pinning {
            threads: HashMap::new(),
            unpinned: Vec::new(),
        }
    }

    /// Hand a resident connection to `owner`. An exact pin match wins;
    /// otherwise the most recently unpinned connection is repinned to `owner`
    /// and handed over. Ownership moves to the caller, who restores the slot
    /// with `set` at checkin.
    pub fn get(&mut self, owner: ThreadId) -> Option<C> {
        if let Some(conn) = self.threads.remove(&owner) {
            return Some(conn);
        }
        self.unpinned.pop().map(|mut conn| {
            conn.pin_to(owner);
            conn
        })
    }

    /// Make `connection` resident under its current pin, replacing any
    /// previous binding for that thread. A connection carrying no pin is
    /// parked on the unpinned list instead.
    pub fn set(&mut self, connection: C) {
        match connection.pinned_to() {
            Some(owner) => {
                self.threads.insert(owner, connection);
            }
            None => self.unpinned.push(connection),
        }
    }

    /// Clear `owner`'s pin, moving its resident connection, if there is one,
    /// onto the unpinned list.
    pub fn unpin(&mut self, owner: ThreadId) {
        if let Some(mut conn) = self.threads.remove(&owner) {
            conn.unpin();
            self.unpinned.push(conn);
        }
    }

    pub fn pinned_count(&self) -> usize {
        self.threads.len()
    }

    pub fn unpinned_count(&self) -> usize {
        self.unpinned.len()
    }
}

// The mapping from address to `Pinning`. Lookup is create-on-miss and keys
// are compared as raw address strings.
#[doc(hidden)]
#[derive(Debug)]
pub struct ConnectionIndex<C> {
    pinnings: HashMap<Address, Pinning<C>>,
}

impl<C> ConnectionIndex<C>
where
    C: Connection,
{
    pub fn new() -> Self {
        ConnectionIndex {
            pinnings: HashMap::new(),
        }
    }

    /// Return the pinning for `address`, installing a fresh empty one on the
    /// first reference.
    pub fn get(&mut self, address: &Address) -> &mut Pinning<C> {
        self.pinnings
            .entry(address.clone())
            .or_insert_with(Pinning::new)
    }

    /// Unpin `owner`'s resident connection in every pinning in the index.
    pub fn unpin(&mut self, owner: ThreadId) {
        self.pinnings
            .values_mut()
            .for_each(|pinning| pinning.unpin(owner));
    }

    pub fn pinnings(&self) -> impl Iterator<Item = &Pinning<C>> {
        self.pinnings.values()
    }
}
