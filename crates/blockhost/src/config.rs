//! Configuration file handling.
//!
//! The file has two tables: `[settings]`, handed to the server untouched as
//! its settings provider, and `[logging]`, consumed by the host itself.

use crate::cli::CliArgs;
use block_server::config::{BINDS_SETTING, DEFAULT_MAX_BYTES, DEFAULT_MAX_PLAYERS, MAX_BYTES_SETTING, MAX_PLAYERS_SETTING};
use block_server::{ConfigError, TomlSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use toml::{Table, Value};
use tracing::info;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server settings, read by key
    #[serde(default)]
    pub settings: Table,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut settings = Table::new();
        settings.insert(
            BINDS_SETTING.to_string(),
            Value::String("0.0.0.0:25565;[::]:25565".to_string()),
        );
        settings.insert(MAX_BYTES_SETTING.to_string(), Value::Integer(DEFAULT_MAX_BYTES as i64));
        settings.insert(MAX_PLAYERS_SETTING.to_string(), Value::Integer(DEFAULT_MAX_PLAYERS as i64));

        Self {
            settings,
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`.
    ///
    /// If the file does not exist a default one is written there and the
    /// defaults are returned.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let default_config = AppConfig::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command line overrides.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(binds) = &args.binds {
            self.settings
                .insert(BINDS_SETTING.to_string(), Value::String(binds.clone()));
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }

        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Checks values the host itself depends on. Server settings are
    /// resolved (with fallbacks) by the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, VALID_LEVELS
            )));
        }

        if let Some((key, _)) = self.settings.iter().find(|(_, value)| value.is_table()) {
            return Err(ConfigError::Invalid(format!(
                "Setting \"{}\" must be a value, not a table",
                key
            )));
        }

        Ok(())
    }

    /// Settings provider over the `[settings]` table.
    pub fn server_settings(&self) -> TomlSettings {
        TomlSettings::new(self.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_server::SettingsProvider;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let settings = config.server_settings();
        assert_eq!(
            settings.get_setting(BINDS_SETTING).as_deref(),
            Some("0.0.0.0:25565;[::]:25565")
        );
        assert_eq!(settings.get_setting(MAX_PLAYERS_SETTING).as_deref(), Some("20"));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_load_from_nonexistent_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blockhost.toml");

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same configuration.
        assert_eq!(AppConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_existing_file() {
        let toml_content = r#"
[settings]
binds = "127.0.0.1:30000"
max_players = 64
num_threads = 4

[logging]
level = "debug"
json_format = true
"#;
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), toml_content).unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        let settings = config.server_settings();

        assert_eq!(settings.get_setting(BINDS_SETTING).as_deref(), Some("127.0.0.1:30000"));
        assert_eq!(settings.get_setting(MAX_PLAYERS_SETTING).as_deref(), Some("64"));
        assert_eq!(settings.get_setting("num_threads").as_deref(), Some("4"));
        assert_eq!(settings.get_setting(MAX_BYTES_SETTING), None);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert!(config.settings.is_empty());
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[settings\nbinds = ").unwrap();

        let result = AppConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();

        config.logging.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.logging.level = "warn".to_string();
        config
            .settings
            .insert("nested".to_string(), Value::Table(Table::new()));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        config.apply_cli(&CliArgs {
            config_path: PathBuf::from("unused.toml"),
            binds: Some(":30001".to_string()),
            log_level: Some("trace".to_string()),
            json_logs: true,
        });

        assert_eq!(
            config.server_settings().get_setting(BINDS_SETTING).as_deref(),
            Some(":30001")
        );
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
    }
}
