//! Connection registry
//!
//! The live set of accepted connections. Membership is the only state;
//! a connection stays until a failure removes it, and removal is final.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::types::ConnectionId;

/// Live connections keyed by id
///
/// No ordering guarantee on iteration.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    limit: Option<usize>,
}

impl ConnectionRegistry {
    /// Create an empty registry, optionally capped at `limit` members
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            connections: HashMap::new(),
            limit,
        }
    }

    /// Register a freshly accepted connection
    ///
    /// Returns the connection back when the registry is at capacity.
    pub fn add(&mut self, connection: Connection) -> Result<(), Connection> {
        if self.is_full() {
            return Err(connection);
        }
        self.connections.insert(connection.id, connection);
        Ok(())
    }

    /// Remove a connection; a no-op if it is already gone
    ///
    /// Dropping the returned handle closes the socket.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Look up a live connection
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Current member ids
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Members that can take a message right now
    pub fn writable(&self) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|conn| conn.is_writable())
            .map(|conn| conn.id)
            .collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether admission control would reject another connection
    pub fn is_full(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.connections.len() >= limit)
    }
}
