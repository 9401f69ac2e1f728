//! Settings providers.
//!
//! The server asks for settings by key and receives optional text; how the
//! values are stored is up to the provider.

use crate::error::ConfigError;
use std::collections::HashMap;
use toml::{Table, Value};

/// Source of textual settings.
pub trait SettingsProvider: Send + Sync {
    fn get_setting(&self, key: &str) -> Option<String>;
}

/// Settings held in memory, mainly for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySettings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl SettingsProvider for MemorySettings {
    fn get_setting(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Settings read from a TOML table.
///
/// Scalars are returned in their textual form. Arrays of scalars are joined
/// with `;`, so `binds = ["0.0.0.0:25565", "[::]:25565"]` and
/// `binds = "0.0.0.0:25565;[::]:25565"` are equivalent. Nested tables have
/// no textual form and read as absent.
#[derive(Debug, Clone, Default)]
pub struct TomlSettings {
    table: Table,
}

impl TomlSettings {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Parses a TOML document whose top-level keys are the settings.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let table = source.parse::<Table>()?;
        Ok(Self::new(table))
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.table.insert(key.into(), value.into());
    }

    fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Integer(number) => Some(number.to_string()),
            Value::Float(number) => Some(number.to_string()),
            Value::Boolean(flag) => Some(flag.to_string()),
            Value::Datetime(datetime) => Some(datetime.to_string()),
            Value::Array(_) | Value::Table(_) => None,
        }
    }
}

impl SettingsProvider for TomlSettings {
    fn get_setting(&self, key: &str) -> Option<String> {
        match self.table.get(key)? {
            Value::Array(items) => items
                .iter()
                .map(Self::scalar_text)
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join(";")),
            other => Self::scalar_text(other),
        }
    }
}
