// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `watch`: Poll the PLC until interrupted
//! - `trigger`, `pulse-bit`, `fire`, `raise`: actuate
//! - `result`, `qr`, `barcode`, `signals`, `work-order`, `read`: inspect
//! - `check`: connectivity
//! - `validate`, `version`

mod device;
mod validate;
mod version;
mod watch;

pub use validate::validate;
pub use version::version;
pub use watch::watch;

use std::fmt::Display;

use linecam_config::{AppConfig, ConfigFormat, ConfigLoader};
use tracing::warn;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::{BinError, BinResult};

/// Executes the appropriate command based on CLI arguments.
///
/// `config` is the result of [`load_app_config`]; commands that do not need
/// it never look at it.
pub async fn execute(cli: Cli, config: BinResult<AppConfig>) -> BinResult<()> {
    let output = cli.output;

    match cli.effective_command() {
        Commands::Version => version::version(&cli),
        Commands::Validate(args) => validate::validate(&cli, args, config),
        Commands::Watch(args) => watch::watch(&cli, args, config?).await,
        command => {
            let config = config?;
            device::run(command, &config, output).await
        }
    }
}

/// Loads the configuration named on the command line.
///
/// A missing file at the default location is not an error: factory defaults
/// plus `LINECAM_*` overrides are used instead.
pub fn load_app_config(cli: &Cli) -> BinResult<AppConfig> {
    if cli.config.exists() {
        return ConfigLoader::new()
            .load(&cli.config)
            .map_err(|e| BinError::from(e).with_context(format!("loading {}", cli.config.display())));
    }

    if cli.config.as_os_str() != "linecam.yaml" {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            cli.config.display()
        )));
    }

    warn!("No configuration file; using defaults");
    Ok(ConfigLoader::new().load_from_str("{}", ConfigFormat::Json)?)
}

/// Prints a result as text or JSON.
pub(crate) fn emit(output: OutputFormat, text: impl Display, json: serde_json::Value) {
    match output {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        ),
    }
}
