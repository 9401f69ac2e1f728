//! Server bootstrap.
//!
//! [`Server::startup`] resolves configuration, runs the mod install phase
//! and wires the lifecycle manager; [`Server::run`] binds the listeners and
//! accepts connections until shutdown is requested or a panic escalates.

use super::acceptor::{AcceptHandler, TcpAcceptor};
use crate::config::{describe_binds, ServerConfig, SettingsProvider};
use crate::connection::{ClientRegistry, Connection};
use crate::error::ServerError;
use crate::lifecycle::{ConnectionLifecycle, ServerEvents};
use crate::logging::{LogSink, PrefixedSink, Severity};
use crate::mods::ModHost;
use crate::panic::PanicSignal;
use crate::world::World;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};
use world_events::WorldEvents;

/// How long [`Server::serve`] waits for open connections to deregister
/// after the accept loops stop.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A configured block server.
pub struct Server {
    config: ServerConfig,
    lifecycle: Arc<ConnectionLifecycle>,
    world: World,
    shutdown: Arc<watch::Sender<bool>>,
    log: Arc<dyn LogSink>,
}

impl Server {
    /// Starts a server with a fresh client registry.
    pub fn startup(
        settings: &dyn SettingsProvider,
        mods: &mut dyn ModHost,
        events: Arc<dyn ServerEvents>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ServerError> {
        Self::startup_with_registry(Arc::new(ClientRegistry::new()), settings, mods, events, log)
    }

    /// Starts a server around an existing registry, which is emptied first.
    ///
    /// Mods are installed into the world tables between
    /// `ServerEvents::on_install(true)` and `on_install(false)`; the tables
    /// are sealed afterwards. Nothing is bound until [`Server::run`].
    pub fn startup_with_registry(
        registry: Arc<ClientRegistry>,
        settings: &dyn SettingsProvider,
        mods: &mut dyn ModHost,
        events: Arc<dyn ServerEvents>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ServerError> {
        registry.clear();

        let startup_log = PrefixedSink::new("Startup: ", log.clone());
        let config = ServerConfig::from_settings(settings, &startup_log);
        debug!("Resolved server configuration: {:?}", config);

        mods.load(&startup_log)?;

        let mut world = WorldEvents::new();
        events.on_install(true);
        let installed = mods.install(&mut world, &startup_log);
        events.on_install(false);
        installed?;
        world.seal();
        info!("🔌 Installed {} mod(s)", mods.mod_count());

        let (shutdown, _) = watch::channel(false);
        let shutdown = Arc::new(shutdown);
        let panic = {
            let shutdown = shutdown.clone();
            Arc::new(PanicSignal::new(move || {
                error!("🛑 Stopping all listeners after panic");
                shutdown.send_replace(true);
            }))
        };

        let world = World::new(Arc::new(world), panic.clone());
        let lifecycle = Arc::new(ConnectionLifecycle::new(registry, panic, log.clone(), events));

        let message = format!("Binding to {}", describe_binds(&config.binds));
        if let Err(e) = log.write(&message, Severity::Information) {
            debug!("Discarding failed bind status line: {}", e);
        }

        Ok(Self {
            config,
            lifecycle,
            world,
            shutdown,
            log,
        })
    }

    /// Binds every configured endpoint.
    pub fn bind(&self) -> Result<TcpAcceptor, ServerError> {
        TcpAcceptor::bind(&self.config.binds, self.config.max_bytes)
    }

    /// Binds and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let acceptor = self.bind()?;
        self.serve(acceptor).await
    }

    /// Serves an already-bound acceptor until shutdown is requested or a
    /// panic escalates.
    ///
    /// Returns [`ServerError::Panicked`] if the server stopped because of a
    /// panic.
    pub async fn serve(&self, acceptor: TcpAcceptor) -> Result<(), ServerError> {
        info!("🚀 Accepting connections on {}", describe_binds(&acceptor.local_addrs()));

        let handler = Arc::new(Dispatch {
            lifecycle: self.lifecycle.clone(),
            max_players: self.config.max_players,
            log: self.log.clone(),
        });
        acceptor.run(handler, self.shutdown.subscribe()).await;

        if self.is_panicked() {
            return Err(ServerError::Panicked);
        }

        info!("🧹 Waiting for open connections to close...");
        let registry = self.lifecycle.registry();
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            debug!("{} connection(s) still open after drain timeout", registry.count());
        }
        info!("Server stopped");
        Ok(())
    }

    /// Requests a graceful stop. Open connections are closed with the
    /// reason "Server shutting down".
    pub fn shutdown(&self) {
        info!("🛑 Shutting down server...");
        self.shutdown.send_replace(true);
    }

    /// Resolves once shutdown has been requested, for any reason.
    pub async fn stopped(&self) {
        let mut receiver = self.shutdown.subscribe();
        let _ = receiver.wait_for(|stop| *stop).await;
    }

    pub fn is_panicked(&self) -> bool {
        self.lifecycle.panic_signal().is_panicked()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        self.lifecycle.registry()
    }

    pub fn panic_signal(&self) -> &Arc<PanicSignal> {
        self.lifecycle.panic_signal()
    }

    pub fn lifecycle(&self) -> &Arc<ConnectionLifecycle> {
        &self.lifecycle
    }

    /// Mutation entry point over the sealed world tables.
    pub fn world(&self) -> &World {
        &self.world
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Routes acceptor callbacks to the lifecycle manager, enforcing the
/// player limit.
struct Dispatch {
    lifecycle: Arc<ConnectionLifecycle>,
    max_players: usize,
    log: Arc<dyn LogSink>,
}

impl AcceptHandler for Dispatch {
    fn on_accept(&self, connection: Arc<dyn Connection>) -> Result<bool, ServerError> {
        // Checked before registration; simultaneous accepts can briefly overshoot.
        if self.lifecycle.registry().count() >= self.max_players {
            let message = format!(
                "Refusing {}, the server is full ({} players)",
                connection.remote_addr(),
                self.max_players
            );
            if let Err(e) = self.log.write(&message, Severity::Warning) {
                debug!("Discarding failed refusal warning: {}", e);
            }
            return Ok(false);
        }

        self.lifecycle.on_accept(connection)?;
        Ok(true)
    }

    fn on_receive(&self, connection: &Arc<dyn Connection>, data: &[u8]) {
        self.lifecycle.on_receive(connection, data);
    }

    fn on_disconnect(&self, connection: &Arc<dyn Connection>, reason: Option<&str>) -> Result<(), ServerError> {
        self.lifecycle.on_disconnect(connection, reason)?;
        Ok(())
    }
}
