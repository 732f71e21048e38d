//! Runtime configuration
//!
//! Wraps the coordinator configuration with the knobs that only matter to the
//! tokio worker. Loaded from JSON, with every field optional.

use std::path::Path;

use pancoord_core::CoordinatorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub coordinator: CoordinatorConfig,
    /// Depth of the command queue feeding the worker
    pub command_buffer_size: usize,
    /// Depth of the observer notification queue
    pub notification_buffer_size: usize,
    /// Restore the network from the store instead of waiting for a start
    /// command, when the store holds one
    pub restore_on_start: bool,
    pub log_level: LogLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            command_buffer_size: 32,
            notification_buffer_size: 128,
            restore_on_start: true,
            log_level: LogLevel::Info,
        }
    }
}

impl RuntimeConfig {
    /// Small queues and the beacon-mode test network
    pub fn testing() -> Self {
        Self {
            coordinator: CoordinatorConfig::testing(),
            command_buffer_size: 8,
            notification_buffer_size: 32,
            restore_on_start: true,
            log_level: LogLevel::Debug,
        }
    }

    pub fn with_coordinator(mut self, coordinator: CoordinatorConfig) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_restore_on_start(mut self, restore: bool) -> Self {
        self.restore_on_start = restore;
        self
    }

    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RuntimeError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RuntimeResult<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RuntimeError::Configuration(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> RuntimeResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RuntimeError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.command_buffer_size == 0 || self.notification_buffer_size == 0 {
            return Err(RuntimeError::Configuration(
                "Queue sizes must be greater than zero".into(),
            ));
        }
        self.coordinator
            .validate()
            .map_err(RuntimeError::Configuration)
    }
}

// ----------------------------------------------------------------------------
// Logging
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Install a console subscriber at `level`
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "restore_on_start": false, "log_level": "debug" }"#)
            .unwrap();
        assert!(!config.restore_on_start);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.command_buffer_size, 32);
    }

    #[test]
    fn json_round_trip_preserves_coordinator_settings() {
        let config = RuntimeConfig::testing();
        let parsed = RuntimeConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_queue_rejected() {
        let config = RuntimeConfig {
            command_buffer_size: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(config.validate(), Err(RuntimeError::Configuration(_))));
    }
}
