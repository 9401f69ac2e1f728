//! Error types for the block server.

use crate::connection::ConnectionId;
use std::net::SocketAddr;
use thiserror::Error;
use world_events::TableError;

/// Failure reported by an application event handler.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Client registry invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    Duplicate(ConnectionId),
    #[error("Connection {0} is not registered")]
    Missing(ConnectionId),
}

/// Connection lifecycle failures. Every one of these escalates to a panic.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Connect handler failed for {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: EventError,
    },
    #[error("Disconnect handler failed for {addr}: {source}")]
    Disconnect {
        addr: SocketAddr,
        #[source]
        source: EventError,
    },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Mod loading and installation errors.
#[derive(Error, Debug)]
pub enum ModError {
    #[error("Mod already loaded: {0}")]
    AlreadyLoaded(String),
    #[error("Mods must be loaded before they are installed")]
    NotLoaded,
    #[error("Mod {name} failed to install: {source}")]
    Install {
        name: String,
        #[source]
        source: Box<ModError>,
    },
    #[error("Hook table error: {0}")]
    Table(#[from] TableError),
    #[error("Mod execution error: {0}")]
    Execution(String),
}

/// Top-level server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Mod error: {0}")]
    Mod(#[from] ModError),
    #[error("Server panicked")]
    Panicked,
    #[error("Internal error: {0}")]
    Internal(String),
}
