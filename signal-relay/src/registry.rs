//! Connection registry: client id <-> live channel.
//!
//! Keeps two maps in lockstep so the relation stays a bijection: each id
//! maps to at most one channel and each channel answers to at most one id.

use crate::channel::{ChannelHandle, ConnectionId};
use signal_types::ClientId;
use std::collections::HashMap;

/// What [`Registry::register`] did.
#[derive(Debug)]
pub enum Registration {
    /// The id was free.
    Inserted,
    /// The id already pointed at this same channel.
    Unchanged,
    /// The id was taken over from another channel, which is returned.
    ///
    /// That channel is no longer reachable by id; the registry does not
    /// close it.
    Superseded(ChannelHandle),
}

/// Client id to channel mapping.
#[derive(Debug, Default)]
pub struct Registry {
    by_id: HashMap<ClientId, ChannelHandle>,
    by_connection: HashMap<ConnectionId, ClientId>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the mapping for `id`.
    pub fn register(&mut self, id: ClientId, channel: ChannelHandle) -> Registration {
        let connection = channel.id();

        // A channel that was known under another id gives that id up.
        if let Some(previous_id) = self.by_connection.get(&connection) {
            if previous_id != &id {
                self.by_id.remove(previous_id);
            }
        }

        let outcome = match self.by_id.insert(id.clone(), channel) {
            None => Registration::Inserted,
            Some(previous) if previous.id() == connection => Registration::Unchanged,
            Some(previous) => {
                self.by_connection.remove(&previous.id());
                Registration::Superseded(previous)
            }
        };
        self.by_connection.insert(connection, id);
        outcome
    }

    /// Current channel for `id`, if any.
    pub fn lookup(&self, id: &str) -> Option<&ChannelHandle> {
        self.by_id.get(id)
    }

    /// Remove whatever id maps to `connection`, returning it.
    ///
    /// Removing a connection that is not registered is a no-op.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<ClientId> {
        let id = self.by_connection.remove(&connection)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// The id a connection is registered under.
    pub fn client_id(&self, connection: ConnectionId) -> Option<&ClientId> {
        self.by_connection.get(&connection)
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
