//! Server-side mods and the install phase.
//!
//! Mods are loaded first, then installed: installation hands each mod
//! mutable access to the [`WorldEvents`] tables so it can register
//! validators and notifiers. The server runs installation before it binds
//! any listener and seals the tables afterwards.

use crate::error::ModError;
use crate::logging::{LogSink, Severity};
use std::collections::HashSet;
use tracing::debug;
use world_events::WorldEvents;

/// A server-side extension.
pub trait Mod: Send + Sync {
    fn name(&self) -> &str;

    /// Registers this mod's hooks.
    fn install(&self, world: &mut WorldEvents) -> Result<(), ModError>;
}

/// Owner of the server's mods.
pub trait ModHost: Send {
    /// Prepares every mod for installation.
    fn load(&mut self, log: &dyn LogSink) -> Result<(), ModError>;

    /// Installs every loaded mod into `world`.
    fn install(&mut self, world: &mut WorldEvents, log: &dyn LogSink) -> Result<(), ModError>;

    fn mod_count(&self) -> usize;
}

/// Mods compiled into the server binary.
#[derive(Default)]
pub struct StaticMods {
    mods: Vec<Box<dyn Mod>>,
    loaded: bool,
}

impl StaticMods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mod; it takes part in the next load.
    pub fn with_mod<M: Mod + 'static>(mut self, module: M) -> Self {
        self.mods.push(Box::new(module));
        self
    }

    pub fn mod_names(&self) -> Vec<&str> {
        self.mods.iter().map(|module| module.name()).collect()
    }
}

impl ModHost for StaticMods {
    fn load(&mut self, log: &dyn LogSink) -> Result<(), ModError> {
        let mut seen = HashSet::new();
        for module in &self.mods {
            if !seen.insert(module.name()) {
                return Err(ModError::AlreadyLoaded(module.name().to_string()));
            }
        }

        for module in &self.mods {
            let message = format!("Loaded mod \"{}\"", module.name());
            if let Err(e) = log.write(&message, Severity::Information) {
                debug!("Discarding failed mod status line: {}", e);
            }
        }

        self.loaded = true;
        Ok(())
    }

    fn install(&mut self, world: &mut WorldEvents, log: &dyn LogSink) -> Result<(), ModError> {
        if !self.loaded {
            return Err(ModError::NotLoaded);
        }

        for module in &self.mods {
            module.install(world).map_err(|e| ModError::Install {
                name: module.name().to_string(),
                source: Box::new(e),
            })?;

            let message = format!("Installed mod \"{}\"", module.name());
            if let Err(e) = log.write(&message, Severity::Information) {
                debug!("Discarding failed mod status line: {}", e);
            }
        }
        Ok(())
    }

    fn mod_count(&self) -> usize {
        self.mods.len()
    }
}

impl std::fmt::Debug for StaticMods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticMods")
            .field("mods", &self.mod_names())
            .field("loaded", &self.loaded)
            .finish()
    }
}
