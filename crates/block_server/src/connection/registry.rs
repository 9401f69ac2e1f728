//! Concurrent client registry.
//!
//! The registry is the only structure mutated by several workers at once.
//! It is backed by a sharded `DashMap`, so operations on unrelated
//! identities only contend on short per-shard critical sections, and
//! lookups never block each other.

use super::{Client, ConnectionId};
use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Maps live connection identities to their client sessions.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    count: AtomicUsize,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fully constructed client under its own identity.
    ///
    /// # Returns
    ///
    /// The number of registered clients including this one, or
    /// [`RegistryError::Duplicate`] if the identity is already present.
    pub fn add(&self, client: Arc<Client>) -> Result<usize, RegistryError> {
        let id = client.id();
        match self.clients.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(id)),
            Entry::Vacant(vacant) => {
                // The count moves while the shard is still locked, so a
                // removal of this identity cannot be counted first.
                let _entry = vacant.insert(client);
                Ok(self.count.fetch_add(1, Ordering::AcqRel) + 1)
            }
        }
    }

    /// Deregisters a client.
    ///
    /// # Returns
    ///
    /// The removed client and the number of clients still registered, or
    /// [`RegistryError::Missing`] if the identity is not present.
    pub fn remove(&self, id: ConnectionId) -> Result<(Arc<Client>, usize), RegistryError> {
        match self.clients.entry(id) {
            Entry::Vacant(_) => Err(RegistryError::Missing(id)),
            Entry::Occupied(occupied) => {
                // Mirrors `add`: the count moves before the shard is released.
                let remaining = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
                Ok((occupied.remove(), remaining))
            }
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Client>> {
        self.clients.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Number of registered clients.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot of every registered client, in no particular order.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drops every registration. Only valid while no acceptor is running,
    /// e.g. when a server instance is being recycled.
    pub fn clear(&self) {
        self.clients.clear();
        self.count.store(0, Ordering::Release);
    }
}
