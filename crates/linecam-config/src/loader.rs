// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for linecam.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse YAML, TOML or JSON by extension
//! 3. Apply `LINECAM_*` environment overrides
//! 4. Validate the poll and logging sections
//!
//! # Environment Variable Override
//!
//! ```text
//! LINECAM_PLC_IP=192.168.1.90
//! LINECAM_PLC_PORT=5020
//! LINECAM_PLC_SLAVE_ID=2
//! LINECAM_LOG_LEVEL=debug
//! LINECAM_LOG_FORMAT=json
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AppConfig, LogFormat, LogLevel};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "LINECAM";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for linecam.
///
/// # Examples
///
/// ```no_run
/// use linecam_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("linecam.yaml").unwrap();
/// println!("PLC at {}:{}", config.plc.ip, config.plc.port);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables in values.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;

        debug!(
            ip = %config.plc.ip,
            port = config.plc.port,
            slave_id = config.plc.slave_id,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Resolves environment variable placeholders in content.
    ///
    /// Supports the format: `${VAR_NAME}` or `${VAR_NAME:default}`. An unset
    /// variable without a default is left in place.
    pub fn resolve_env_placeholders(&self, content: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (env::var(var_name), default_value) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!("Environment variable '{}' not found", var_name);
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        Ok(result)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        let key = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Ok(value) = env::var(key("PLC_IP")) {
            config.plc.ip = value;
        }
        if let Ok(value) = env::var(key("PLC_PORT")) {
            config.plc.port = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env_var(key("PLC_PORT"), "expected valid port number")
            })?;
        }
        if let Ok(value) = env::var(key("PLC_SLAVE_ID")) {
            config.plc.slave_id = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env_var(key("PLC_SLAVE_ID"), "expected valid station id")
            })?;
        }

        if let Ok(value) = env::var(key("LOG_LEVEL")) {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!("Ignoring unknown log level '{}'", value),
            }
        }
        if let Ok(value) = env::var(key("LOG_FORMAT")) {
            match LogFormat::parse(&value) {
                Some(format) => config.logging.format = format,
                None => warn!("Ignoring unknown log format '{}'", value),
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();

        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }

        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// ConfigWatcher
// =============================================================================

/// Polls a configuration file's modification time.
///
/// The first check only records the current time; later checks report a
/// change when the file is newer than what was last seen.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    loader: ConfigLoader,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Creates a new configuration watcher.
    pub fn new(path: impl Into<PathBuf>, loader: ConfigLoader) -> Self {
        Self {
            path: path.into(),
            loader,
            last_modified: None,
        }
    }

    /// Returns the watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the configuration file has changed.
    pub fn has_changed(&mut self) -> bool {
        let Ok(modified) = fs::metadata(&self.path).and_then(|m| m.modified()) else {
            return false;
        };

        match self.last_modified {
            Some(last) if modified > last => {
                self.last_modified = Some(modified);
                true
            }
            Some(_) => false,
            None => {
                self.last_modified = Some(modified);
                false
            }
        }
    }

    /// Reloads the configuration if it has changed.
    pub fn reload_if_changed(&mut self) -> ConfigResult<Option<AppConfig>> {
        if self.has_changed() {
            info!("Configuration file changed: {}", self.path.display());
            self.loader.load(&self.path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Forces a reload of the configuration.
    pub fn reload(&self) -> ConfigResult<AppConfig> {
        self.loader.load(&self.path)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// ```no_run
/// use linecam_config::loader::load_config;
///
/// let config = load_config("linecam.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_test_yaml() -> String {
        r#"
plc:
  ip: 10.0.0.5
  port: 5020
  slave_id: 3
  trigger_addresses: [8, 9]
  pass_register: 3000
  pass_bit: 2
  qr_length: 32
  timing:
    pulse: 200ms
    trigger_min_gap: 2s

poll:
  interval: 250ms
  read_qr: false

logging:
  level: debug
"#
        .to_string()
    }

    fn isolated_loader(tag: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(format!("LINECAM_TEST_{tag}"))
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let config = isolated_loader("YAML").load(file.path()).unwrap();

        assert_eq!(config.plc.ip, "10.0.0.5");
        assert_eq!(config.plc.port, 5020);
        assert_eq!(config.plc.slave_id, 3);
        assert_eq!(config.plc.trigger_addresses, vec![8, 9]);
        assert_eq!(config.plc.pass_bit, 2);
        assert_eq!(config.plc.timing.pulse, Duration::from_millis(200));
        assert_eq!(config.plc.timing.trigger_min_gap, Duration::from_secs(2));
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert!(!config.poll.read_qr);
        assert_eq!(config.logging.level, LogLevel::Debug);
        // Unset fields keep their defaults.
        assert_eq!(config.plc.fail_register, 3001);
        assert_eq!(config.plc.timing.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[plc]
ip = "10.0.0.6"
port = 502

[plc.barcode]
start = 4200
chars = 10

[poll]
interval = "1s"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = isolated_loader("TOML").load(file.path()).unwrap();
        assert_eq!(config.plc.ip, "10.0.0.6");
        assert_eq!(config.plc.barcode.start, 4200);
        assert_eq!(config.plc.barcode.chars, 10);
        assert_eq!(config.plc.barcode.words_per_char, 2);
        assert_eq!(config.poll.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_load_json() {
        let json = r#"{ "plc": { "ip": "10.0.0.7", "input_fallback": true } }"#;
        let config = isolated_loader("JSON")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.plc.ip, "10.0.0.7");
        assert!(config.plc.input_fallback);
    }

    #[test]
    fn test_out_of_range_plc_values_still_load() {
        let json = r#"{ "plc": { "port": 70000, "pass_bit": 99, "qr_length": -4 } }"#;
        let config = isolated_loader("RANGE")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.plc.port, 70000);
        assert_eq!(config.plc.pass_bit, 99);
    }

    #[test]
    fn test_invalid_poll_section_fails() {
        let json = r#"{ "poll": { "interval": "5ms" } }"#;
        let result = isolated_loader("POLL").load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let json = r#"{ "api": { "port": 8080 } }"#;
        let result = isolated_loader("UNKNOWN").load_from_str(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Serialization { .. })));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("linecam.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("linecam.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("linecam.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("linecam.JSON")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("linecam.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("linecam")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = ConfigLoader::new();
        let result = loader
            .resolve_env_placeholders("ip: ${LINECAM_TEST_NONEXISTENT_VAR:192.168.0.10}")
            .unwrap();
        assert_eq!(result, "ip: 192.168.0.10");
    }

    #[test]
    fn test_env_placeholder_set_and_missing() {
        env::set_var("LINECAM_TEST_PLACEHOLDER_HOST", "plc-a");
        let loader = ConfigLoader::new();

        let result = loader
            .resolve_env_placeholders("ip: ${LINECAM_TEST_PLACEHOLDER_HOST:fallback}")
            .unwrap();
        assert_eq!(result, "ip: plc-a");

        let result = loader
            .resolve_env_placeholders("ip: ${LINECAM_TEST_PLACEHOLDER_MISSING}")
            .unwrap();
        assert_eq!(result, "ip: ${LINECAM_TEST_PLACEHOLDER_MISSING}");

        let result = loader.resolve_env_placeholders("ip: ${unterminated").unwrap();
        assert_eq!(result, "ip: ${unterminated");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("LINECAM_TEST_OVR_PLC_IP", "10.1.1.1");
        env::set_var("LINECAM_TEST_OVR_PLC_PORT", "1502");
        env::set_var("LINECAM_TEST_OVR_PLC_SLAVE_ID", "7");
        env::set_var("LINECAM_TEST_OVR_LOG_LEVEL", "warning");

        let config = ConfigLoader::builder()
            .env_prefix("LINECAM_TEST_OVR")
            .build()
            .load_from_str("{}", ConfigFormat::Json)
            .unwrap();

        assert_eq!(config.plc.ip, "10.1.1.1");
        assert_eq!(config.plc.port, 1502);
        assert_eq!(config.plc.slave_id, 7);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_env_override_invalid_port() {
        env::set_var("LINECAM_TEST_BADPORT_PLC_PORT", "not-a-port");
        let result = ConfigLoader::new()
            .with_env_prefix("LINECAM_TEST_BADPORT")
            .load_from_str("{}", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("MYAPP")
            .resolve_env_vars(false)
            .build();

        assert_eq!(loader.env_prefix, "MYAPP");
        assert!(!loader.resolve_env_vars);
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/linecam.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = isolated_loader("PARSE").load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_watcher_detects_change() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let mut watcher = ConfigWatcher::new(file.path(), isolated_loader("WATCH"));

        assert!(!watcher.has_changed());
        assert!(!watcher.has_changed());
        assert!(watcher.reload_if_changed().unwrap().is_none());

        let updated = create_test_yaml().replace("10.0.0.5", "10.0.0.99");
        fs::write(file.path(), updated).unwrap();
        let later = SystemTime::now() + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(file.path())
            .unwrap()
            .set_modified(later)
            .unwrap();

        let config = watcher.reload_if_changed().unwrap().unwrap();
        assert_eq!(config.plc.ip, "10.0.0.99");
        assert!(!watcher.has_changed());
    }
}
