//! Client session representation.

use super::{Connection, ConnectionId};
use crate::error::ServerError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::SystemTime;

/// A registered client session.
///
/// Wraps exactly one [`Connection`] for its whole lifetime. The client's
/// identity is captured from the connection at construction and never
/// changes.
#[derive(Debug)]
pub struct Client {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connection: Arc<dyn Connection>,
    connected_at: SystemTime,
}

impl Client {
    /// Wraps an accepted connection.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            id: connection.id(),
            remote_addr: connection.remote_addr(),
            connection,
            connected_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn ip(&self) -> IpAddr {
        self.remote_addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.remote_addr.port()
    }

    /// When the client was accepted.
    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Queues bytes for delivery to this client.
    pub fn send(&self, data: Vec<u8>) -> Result<(), ServerError> {
        self.connection.send(data)
    }

    /// Asks the acceptor to drop this client.
    pub fn disconnect(&self, reason: &str) {
        self.connection.disconnect(reason)
    }
}
