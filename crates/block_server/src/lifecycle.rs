//! Connection lifecycle management.
//!
//! [`ConnectionLifecycle`] adapts the acceptor's callbacks to the client
//! registry and to the application's [`ServerEvents`]. Each connection moves
//! through `Accepted → Registered → Deregistering → Removed`.
//!
//! Any failure while registering, deregistering or running an application
//! handler is an invariant violation: the [`PanicSignal`] fires first, then
//! the error (or the handler's panic) continues to the caller. Status lines
//! written after a successful transition are best effort and their failures
//! are discarded.

use crate::connection::{Client, ClientRegistry, Connection};
use crate::error::{EventError, LifecycleError, RegistryError};
use crate::logging::{LogSink, Severity};
use crate::panic::PanicSignal;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Application callbacks fired by the server.
///
/// Every method has a no-op default so implementors only override what
/// they need.
pub trait ServerEvents: Send + Sync {
    /// A client has been registered and may be used.
    fn on_connect(&self, _client: &Arc<Client>) -> Result<(), EventError> {
        Ok(())
    }

    /// A client has been deregistered. `reason` is empty when none was given.
    fn on_disconnect(&self, _client: &Arc<Client>, _reason: &str) -> Result<(), EventError> {
        Ok(())
    }

    /// Raw bytes from a connection, forwarded untouched.
    fn on_receive(&self, _connection: &Arc<dyn Connection>, _data: &[u8]) {}

    /// Brackets the mod install phase: `true` before mods install, `false` after.
    fn on_install(&self, _before: bool) {}
}

/// [`ServerEvents`] implementation that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl ServerEvents for NoopEvents {}

/// Wires acceptor callbacks to the client registry.
pub struct ConnectionLifecycle {
    registry: Arc<ClientRegistry>,
    panic: Arc<PanicSignal>,
    log: Arc<dyn LogSink>,
    events: Arc<dyn ServerEvents>,
}

impl ConnectionLifecycle {
    pub fn new(
        registry: Arc<ClientRegistry>,
        panic: Arc<PanicSignal>,
        log: Arc<dyn LogSink>,
        events: Arc<dyn ServerEvents>,
    ) -> Self {
        Self {
            registry,
            panic,
            log,
            events,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn panic_signal(&self) -> &Arc<PanicSignal> {
        &self.panic
    }

    /// Handles a newly accepted connection.
    ///
    /// Wraps the connection in a [`Client`], registers it and fires
    /// [`ServerEvents::on_connect`]. On failure the panic signal fires before
    /// the error is returned; a panicking handler fires it before unwinding
    /// further.
    pub fn on_accept(&self, connection: Arc<dyn Connection>) -> Result<Arc<Client>, LifecycleError> {
        let addr = connection.remote_addr();

        let client = self.escalating("accept", addr, || {
            let client = Arc::new(Client::new(connection));
            self.registry.add(client.clone())?;
            self.events
                .on_connect(&client)
                .map_err(|source| LifecycleError::Connect { addr, source })?;
            Ok(client)
        })?;

        // Best effort: a failed status line never undoes the registration.
        let message = format!("{} connected, {}", addr, Self::clients_phrase(self.registry.count()));
        if let Err(e) = self.log.write(&message, Severity::Information) {
            debug!("Discarding failed connect status line: {}", e);
        }

        Ok(client)
    }

    /// Handles a connection that has closed.
    ///
    /// Looks up and deregisters the client, then fires
    /// [`ServerEvents::on_disconnect`] with the removed client and `reason`.
    /// A connection that was never registered is an invariant violation.
    pub fn on_disconnect(
        &self,
        connection: &Arc<dyn Connection>,
        reason: Option<&str>,
    ) -> Result<Arc<Client>, LifecycleError> {
        let addr = connection.remote_addr();
        let id = connection.id();
        let reason = reason.unwrap_or_default();

        let client = self.escalating("disconnect", addr, || {
            self.registry.get(id).ok_or(RegistryError::Missing(id))?;
            let (client, _) = self.registry.remove(id)?;
            self.events
                .on_disconnect(&client, reason)
                .map_err(|source| LifecycleError::Disconnect { addr, source })?;
            Ok(client)
        })?;

        // Best effort, as for connects.
        let message = if reason.is_empty() {
            format!("{} disconnected, {}", addr, Self::clients_phrase(self.registry.count()))
        } else {
            format!(
                "{} disconnected ({}), {}",
                addr,
                reason,
                Self::clients_phrase(self.registry.count())
            )
        };
        if let Err(e) = self.log.write(&message, Severity::Information) {
            debug!("Discarding failed disconnect status line: {}", e);
        }

        Ok(client)
    }

    /// Forwards received bytes to the application without inspecting them.
    pub fn on_receive(&self, connection: &Arc<dyn Connection>, data: &[u8]) {
        self.events.on_receive(connection, data);
    }

    /// Runs one lifecycle transition, escalating any failure before it
    /// leaves this component.
    fn escalating<T, F>(&self, transition: &str, addr: SocketAddr, step: F) -> Result<T, LifecycleError>
    where
        F: FnOnce() -> Result<T, LifecycleError>,
    {
        match panic::catch_unwind(AssertUnwindSafe(step)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Invariant violated during {} of {}: {}", transition, addr, e);
                self.panic.panic();
                Err(e)
            }
            Err(payload) => {
                error!("Handler panicked during {} of {}", transition, addr);
                self.panic.panic();
                panic::resume_unwind(payload)
            }
        }
    }

    fn clients_phrase(count: usize) -> String {
        if count == 1 {
            "there is now 1 client connected".to_string()
        } else {
            format!("there are now {} clients connected", count)
        }
    }
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("registry", &self.registry)
            .field("panic", &self.panic)
            .finish()
    }
}
