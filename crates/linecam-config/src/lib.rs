// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # linecam-config
//!
//! Configuration management for the linecam PLC client.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `LINECAM_*` variables override the PLC endpoint and logging
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside config files
//! - **Hot Reload**: modification-time polling through [`ConfigWatcher`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use linecam_config::loader::load_config;
//!
//! let config = load_config("linecam.yaml").unwrap();
//! println!("PLC: {}:{}", config.plc.ip, config.plc.port);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! plc:
//!   ip: "${PLC_IP:192.168.1.81}"
//!   port: 502
//!   trigger_addresses: [0, 1, 2]
//!   result_register: 4112
//!   timing:
//!     pulse: 120ms
//! poll:
//!   interval: 500ms
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use schema::{
    AppConfig,
    PollSettings,
    LoggingSettings,
    LogLevel,
    LogFormat,
};

pub use loader::{
    ConfigLoader,
    ConfigLoaderBuilder,
    ConfigFormat,
    ConfigWatcher,
    load_config,
    load_config_str,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "linecam-config");
        assert!(!VERSION.is_empty());
    }
}
