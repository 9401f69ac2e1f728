//! Client connections and the registry that tracks them.
//!
//! A [`Connection`] is supplied by the network acceptor; once it has been
//! accepted it is wrapped in a [`Client`] and stored in the
//! [`ClientRegistry`] until it disconnects.

pub mod client;
pub mod registry;

pub use client::Client;
pub use registry::ClientRegistry;

use crate::error::ServerError;
use std::fmt;
use std::net::SocketAddr;

/// Type alias for connection identifiers.
///
/// Identifiers are assigned by the acceptor and are unique among live
/// connections.
pub type ConnectionId = usize;

/// A byte-stream connection owned by the network acceptor.
pub trait Connection: Send + Sync + fmt::Debug {
    fn id(&self) -> ConnectionId;

    fn remote_addr(&self) -> SocketAddr;

    /// Queues bytes for delivery to the peer.
    fn send(&self, data: Vec<u8>) -> Result<(), ServerError>;

    /// Asks the acceptor to close the connection. The disconnect callback
    /// fires later, with `reason`, once the connection has actually closed.
    fn disconnect(&self, reason: &str);
}
