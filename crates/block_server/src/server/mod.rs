//! Network acceptor and server bootstrap.

pub mod acceptor;
pub mod core;

pub use acceptor::{AcceptHandler, TcpAcceptor, TcpConnection};
pub use self::core::Server;
