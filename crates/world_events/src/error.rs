//! Error types for hook tables and the mutation dispatcher.

use thiserror::Error;

/// Errors raised by [`HookTable`](crate::HookTable) and by installs on
/// [`WorldEvents`](crate::WorldEvents).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The block type id does not name a slot
    #[error("Block type {0} is outside the hook table domain")]
    OutOfDomain(usize),
    /// The table was never initialized, or has been torn down
    #[error("Hook table is not initialized")]
    Uninitialized,
    /// `initialize_defaults` was called on a live table
    #[error("Hook table is already initialized")]
    AlreadyInitialized,
    /// Installs are closed once the server starts accepting connections
    #[error("Hook tables are sealed; installs are only allowed before the server starts")]
    Sealed,
}

/// Failure reported by a mod-supplied validator or notifier.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Hook failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Convenience constructor for a message-only failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors surfaced by the dispatcher.
///
/// Only the notify phase lets these escape `try_set`; during the gate phase
/// they are folded into a refusal.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}
