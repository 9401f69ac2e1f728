//! Logging sink used for operator-facing status lines.
//!
//! Components that report to the operator write through a [`LogSink`]
//! rather than calling `tracing` directly, so the sink can be swapped
//! (or made to fail, in tests). Writes are always best effort: callers
//! discard sink failures instead of letting them affect server state.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// Failure to deliver a status line.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for operator-facing status lines.
pub trait LogSink: Send + Sync {
    fn write(&self, message: &str, severity: Severity) -> Result<(), LogError>;
}

/// Writes status lines as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, message: &str, severity: Severity) -> Result<(), LogError> {
        match severity {
            Severity::Information => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
        Ok(())
    }
}

/// Prepends a fixed prefix to every line, e.g. `"Startup: "` for messages
/// produced while mods are loading.
pub struct PrefixedSink {
    prefix: String,
    inner: Arc<dyn LogSink>,
}

impl PrefixedSink {
    pub fn new(prefix: impl Into<String>, inner: Arc<dyn LogSink>) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl LogSink for PrefixedSink {
    fn write(&self, message: &str, severity: Severity) -> Result<(), LogError> {
        self.inner
            .write(&format!("{}{}", self.prefix, message), severity)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_prefixed_sink() {
        let recorder = Arc::new(RecordingSink::default());
        let sink = PrefixedSink::new("Startup: ", recorder.clone());

        sink.write("Loaded mod greeter", Severity::Information).unwrap();
        sink.write("Mod directory missing", Severity::Warning).unwrap();

        assert_eq!(
            recorder.lines(),
            vec![
                ("Startup: Loaded mod greeter".to_string(), Severity::Information),
                ("Startup: Mod directory missing".to_string(), Severity::Warning),
            ]
        );
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let sink = TracingSink;
        for severity in [Severity::Information, Severity::Warning, Severity::Error] {
            assert!(sink.write("status", severity).is_ok());
        }
    }
}
