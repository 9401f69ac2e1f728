//! Server configuration.
//!
//! Settings arrive as text from a [`SettingsProvider`] and are resolved here
//! into a typed [`ServerConfig`]. Missing or unusable values fall back to
//! the defaults below.

pub mod binds;
pub mod settings;

pub use binds::{default_binds, describe_binds, parse_bind, parse_binds};
pub use settings::{MemorySettings, SettingsProvider, TomlSettings};

use crate::logging::{LogSink, Severity};
use std::net::SocketAddr;
use tracing::debug;

/// Port used by bind entries that do not name one.
pub const DEFAULT_PORT: u16 = 25565;

/// Default cap on bytes delivered per receive callback.
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

/// Default player limit.
pub const DEFAULT_MAX_PLAYERS: usize = 20;

pub const BINDS_SETTING: &str = "binds";
pub const MAX_BYTES_SETTING: &str = "max_bytes";
pub const MAX_PLAYERS_SETTING: &str = "max_players";
pub const NUM_THREADS_SETTING: &str = "num_threads";

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Endpoints to listen on; never empty
    pub binds: Vec<SocketAddr>,

    /// Maximum number of bytes handed to a single receive callback
    pub max_bytes: usize,

    /// Maximum number of concurrently registered clients
    pub max_players: usize,

    /// Number of worker threads; always positive
    pub num_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binds: default_binds(),
            max_bytes: DEFAULT_MAX_BYTES,
            max_players: DEFAULT_MAX_PLAYERS,
            num_threads: default_num_threads(),
        }
    }
}

impl ServerConfig {
    /// Resolves every server setting from `settings`.
    ///
    /// Warnings about unusable values are written to `log`; they never stop
    /// resolution.
    pub fn from_settings(settings: &dyn SettingsProvider, log: &dyn LogSink) -> Self {
        let max_bytes = resolve_count(settings, MAX_BYTES_SETTING, DEFAULT_MAX_BYTES, log);
        let max_players = resolve_count(settings, MAX_PLAYERS_SETTING, DEFAULT_MAX_PLAYERS, log);
        let num_threads = resolve_worker_count(settings.get_setting(NUM_THREADS_SETTING).as_deref());
        let binds = parse_binds(settings.get_setting(BINDS_SETTING).as_deref(), log);

        Self {
            binds,
            max_bytes,
            max_players,
            num_threads,
        }
    }
}

/// Default worker count: one per logical CPU.
pub fn default_num_threads() -> usize {
    num_cpus::get().max(1)
}

/// Resolves the worker count setting to a positive integer.
///
/// Absent, unparseable, zero and negative values all resolve to
/// [`default_num_threads`].
pub fn resolve_worker_count(value: Option<&str>) -> usize {
    value
        .and_then(|text| text.trim().parse::<i64>().ok())
        .filter(|count| *count > 0)
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or_else(default_num_threads)
}

fn resolve_count(settings: &dyn SettingsProvider, key: &str, default: usize, log: &dyn LogSink) -> usize {
    let Some(text) = settings.get_setting(key) else {
        return default;
    };

    match text.trim().parse::<usize>() {
        Ok(value) => value,
        Err(_) => {
            let message = format!(
                "Setting \"{}\" has unusable value \"{}\", using default {}",
                key, text, default
            );
            if let Err(e) = log.write(&message, Severity::Warning) {
                debug!("Discarding failed settings warning: {}", e);
            }
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::RecordingSink;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let sink = RecordingSink::default();
        let config = ServerConfig::from_settings(&MemorySettings::new(), &sink);

        assert_eq!(config, ServerConfig::default());
        assert!(config.num_threads > 0);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_values_are_resolved() {
        let settings = MemorySettings::new()
            .with(BINDS_SETTING, "127.0.0.1:30000")
            .with(MAX_BYTES_SETTING, "4096")
            .with(MAX_PLAYERS_SETTING, "100")
            .with(NUM_THREADS_SETTING, "3");
        let config = ServerConfig::from_settings(&settings, &RecordingSink::default());

        assert_eq!(config.binds, vec!["127.0.0.1:30000".parse::<SocketAddr>().unwrap()]);
        assert_eq!(config.max_bytes, 4096);
        assert_eq!(config.max_players, 100);
        assert_eq!(config.num_threads, 3);
    }

    #[test]
    fn test_unparseable_counts_fall_back_with_warning() {
        let settings = MemorySettings::new()
            .with(MAX_BYTES_SETTING, "lots")
            .with(MAX_PLAYERS_SETTING, "-5");
        let sink = RecordingSink::default();
        let config = ServerConfig::from_settings(&settings, &sink);

        assert_eq!(config.max_bytes, DEFAULT_MAX_BYTES);
        assert_eq!(config.max_players, DEFAULT_MAX_PLAYERS);
        assert_eq!(sink.messages(Severity::Warning).len(), 2);
    }

    #[test]
    fn test_worker_count_resolution() {
        let default = default_num_threads();
        assert_eq!(resolve_worker_count(None), default);
        assert_eq!(resolve_worker_count(Some("")), default);
        assert_eq!(resolve_worker_count(Some("zero")), default);
        assert_eq!(resolve_worker_count(Some("0")), default);
        assert_eq!(resolve_worker_count(Some("-2")), default);
        assert_eq!(resolve_worker_count(Some("6")), 6);
        assert_eq!(resolve_worker_count(Some(" 12 ")), 12);
    }
}
