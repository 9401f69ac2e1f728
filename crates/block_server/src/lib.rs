//! # Block Server
//!
//! Runtime core of a multiplayer block-world server: client tracking,
//! connection lifecycle, fatal error escalation, configuration and the TCP
//! front end. World mutation gating lives in the `world_events` crate and
//! is re-exported here for convenience.
//!
//! ## Startup
//!
//! ```rust,no_run
//! use block_server::{MemorySettings, NoopEvents, Server, StaticMods, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn start() -> Result<(), block_server::ServerError> {
//! let settings = MemorySettings::new().with("binds", "127.0.0.1:25565");
//! let server = Server::startup(
//!     &settings,
//!     &mut StaticMods::new(),
//!     Arc::new(NoopEvents),
//!     Arc::new(TracingSink),
//! )?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Fatal errors
//!
//! Registry invariant violations and failures inside application lifecycle
//! callbacks fire the server's [`PanicSignal`] before the error continues to
//! the caller. So does a failing notifier behind [`World::try_set`]. The
//! signal's shutdown action runs exactly once and stops every accept loop.

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod mods;
pub mod panic;
pub mod server;
pub mod world;

pub use config::{MemorySettings, ServerConfig, SettingsProvider, TomlSettings};
pub use connection::{Client, ClientRegistry, Connection, ConnectionId};
pub use error::{ConfigError, EventError, LifecycleError, ModError, RegistryError, ServerError};
pub use lifecycle::{ConnectionLifecycle, NoopEvents, ServerEvents};
pub use logging::{LogError, LogSink, PrefixedSink, Severity, TracingSink};
pub use mods::{Mod, ModHost, StaticMods};
pub use panic::PanicSignal;
pub use server::{AcceptHandler, Server, TcpAcceptor, TcpConnection};
pub use world::World;

pub use world_events;
