// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for linecam.
//!
//! # Schema Structure
//!
//! ```text
//! AppConfig
//! ├── plc: PlcOptions
//! ├── poll: PollSettings
//! └── logging: LoggingSettings
//! ```
//!
//! The `plc` section is handed to the client as-is and normalized there, so
//! it is never rejected here. The other sections are validated on load.

use std::time::Duration;

use linecam_modbus::PlcOptions;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default config file check interval.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(2);

/// Default connection check interval.
pub const DEFAULT_CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// AppConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// PLC register map and timing.
    #[serde(default)]
    pub plc: PlcOptions,

    /// Poll loop settings.
    #[serde(default)]
    pub poll: PollSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.poll.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// PollSettings
// =============================================================================

/// `watch` loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSettings {
    /// Delay between poll cycles.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Delay between config file checks.
    #[serde(default = "default_reload_interval", with = "humantime_serde")]
    pub reload_interval: Duration,

    /// Delay between connection checks.
    #[serde(default = "default_connection_check_interval", with = "humantime_serde")]
    pub connection_check_interval: Duration,

    /// Skip the register read when checking the connection.
    #[serde(default)]
    pub tcp_only_check: bool,

    /// Clear the result register once a verdict is read.
    #[serde(default = "default_enabled")]
    pub clear_after_result: bool,

    /// Clear the trigger flag once a cycle completes.
    #[serde(default = "default_enabled")]
    pub clear_trigger_after_result: bool,

    /// Read the PLC QR text on each trigger.
    #[serde(default = "default_enabled")]
    pub read_qr: bool,
}

impl PollSettings {
    /// Validates the poll settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval < MIN_POLL_INTERVAL || self.interval > MAX_POLL_INTERVAL {
            return Err(ConfigError::out_of_range(
                "poll.interval_ms",
                self.interval.as_millis(),
                MIN_POLL_INTERVAL.as_millis(),
                MAX_POLL_INTERVAL.as_millis(),
            ));
        }
        if self.reload_interval < Duration::from_millis(100) {
            return Err(ConfigError::validation(
                "poll.reload_interval",
                "must be at least 100ms",
            ));
        }
        if self.connection_check_interval.is_zero() {
            return Err(ConfigError::validation(
                "poll.connection_check_interval",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            connection_check_interval: DEFAULT_CONNECTION_CHECK_INTERVAL,
            tcp_only_check: false,
            clear_after_result: true,
            clear_trigger_after_result: true,
            read_qr: true,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include span targets in logs.
    #[serde(default = "default_enabled")]
    pub with_target: bool,

    /// Include thread IDs in logs.
    #[serde(default)]
    pub with_thread_ids: bool,
}

impl LoggingSettings {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            with_target: true,
            with_thread_ids: false,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name; `warning` is accepted for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON for log shippers.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_reload_interval() -> Duration {
    DEFAULT_RELOAD_INTERVAL
}

fn default_connection_check_interval() -> Duration {
    DEFAULT_CONNECTION_CHECK_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.plc.port, 502);
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut poll = PollSettings::default();
        poll.interval = Duration::from_millis(10);
        assert!(matches!(poll.validate(), Err(ConfigError::OutOfRange { .. })));

        poll.interval = Duration::from_secs(61);
        assert!(poll.validate().is_err());

        poll.interval = Duration::from_secs(1);
        assert!(poll.validate().is_ok());
    }

    #[test]
    fn test_reload_interval_floor() {
        let poll = PollSettings {
            reload_interval: Duration::from_millis(20),
            ..PollSettings::default()
        };
        assert!(matches!(poll.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_json_roundtrip_keeps_durations() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"interval\":\"500ms\""));
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
