// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `watch`: Poll the PLC and log inspection cycles (default)
//! - one-shot device commands: `trigger`, `pulse-bit`, `fire`, `raise`,
//!   `result`, `qr`, `barcode`, `signals`, `work-order`, `read`, `check`
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use linecam_config::{LogLevel, LoggingSettings};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// linecam - PLC and vision camera client
///
/// Talks Modbus/TCP to a production-line PLC that fronts an inspection
/// camera: fires triggers, reads verdicts and QR/barcode text.
#[derive(Parser, Debug)]
#[command(
    name = "linecam",
    author = "Sylvex <contact@sylvex.io>",
    version = linecam_modbus::VERSION,
    about = "Modbus/TCP client for a PLC and vision-camera pair",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "linecam.yaml",
        env = "LINECAM_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the linecam CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll the PLC until interrupted
    ///
    /// This is the default command. Each rising edge of the trigger flag
    /// reads the verdict and QR text, then clears the flag. The config file
    /// is re-read when it changes.
    Watch(WatchArgs),

    /// Fire the camera trigger coil once
    Trigger(TriggerArgs),

    /// Pulse a register bit (the manual trigger bit by default)
    #[command(name = "pulse-bit")]
    PulseBit(PulseBitArgs),

    /// Write the external trigger fire register
    Fire(FireArgs),

    /// Raise the trigger flag with a clean 0 -> 1 edge
    Raise,

    /// Read the inspection verdict
    Result(ResultArgs),

    /// Read the PLC QR text
    Qr,

    /// Read the camera barcode
    Barcode(BarcodeArgs),

    /// Show PASS/FAIL, guard, signal and ready flags
    Signals,

    /// Read or write the work-order handshake
    #[command(name = "work-order")]
    WorkOrder(WorkOrderArgs),

    /// Read raw holding registers
    Read(ReadArgs),

    /// Check PLC and camera connectivity
    Check(CheckArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `watch` command.
#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    /// Do not reload the configuration file when it changes
    #[arg(long)]
    pub no_reload: bool,

    /// Stop after this many inspection cycles
    #[arg(long)]
    pub cycles: Option<u64>,
}

/// Arguments for the `trigger` command.
#[derive(Args, Debug, Default, Clone)]
pub struct TriggerArgs {
    /// Coil pulse width (e.g. 120ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub pulse: Option<Duration>,

    /// Minimum gap between triggers (e.g. 1500ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub min_gap: Option<Duration>,
}

/// Arguments for the `pulse-bit` command.
#[derive(Args, Debug, Default, Clone)]
pub struct PulseBitArgs {
    /// Holding register
    #[arg(requires = "bit")]
    pub register: Option<u16>,

    /// Bit index (0-15)
    pub bit: Option<u8>,

    /// Pulse width (e.g. 120ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub pulse: Option<Duration>,
}

/// Arguments for the `fire` command.
#[derive(Args, Debug, Clone)]
pub struct FireArgs {
    /// Value to write
    #[arg(default_value = "1")]
    pub value: u16,

    /// Restore the previous value after the pulse
    #[arg(long)]
    pub release: bool,

    /// Pulse width before release (e.g. 120ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub pulse: Option<Duration>,
}

/// Arguments for the `result` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ResultArgs {
    /// Clear the result register after a decisive read
    #[arg(long)]
    pub clear: bool,
}

/// Arguments for the `barcode` command. Unset fields use the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct BarcodeArgs {
    /// First register
    #[arg(long)]
    pub start: Option<u16>,

    /// Number of characters
    #[arg(long)]
    pub chars: Option<u16>,

    /// Registers per character
    #[arg(long)]
    pub words_per_char: Option<u16>,
}

/// Arguments for the `work-order` command.
#[derive(Args, Debug, Default, Clone)]
pub struct WorkOrderArgs {
    /// Set the ready flag
    #[arg(long, conflicts_with = "clear")]
    pub ready: bool,

    /// Clear the ready flag
    #[arg(long)]
    pub clear: bool,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// First register
    pub start: u16,

    /// Number of registers (1-125)
    #[arg(default_value = "1")]
    pub count: u16,
}

/// Arguments for the `check` command.
#[derive(Args, Debug, Default, Clone)]
pub struct CheckArgs {
    /// Only probe the TCP port
    #[arg(long)]
    pub tcp_only: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Show the normalized register map
    #[arg(long)]
    pub show_map: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormat> for linecam_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => linecam_config::LogFormat::Text,
            LogFormat::Json => linecam_config::LogFormat::Json,
            LogFormat::Compact => linecam_config::LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Watch` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Watch(WatchArgs::default()))
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Merges CLI flags over the config file's logging section.
    pub fn logging_settings(&self, file: Option<&LoggingSettings>) -> LoggingSettings {
        let mut settings = file.cloned().unwrap_or_default();

        if let Some(level) = self.log_level.as_deref().and_then(LogLevel::parse) {
            settings.level = level;
        }
        if let Some(format) = self.log_format {
            settings.format = format.into();
        }
        if self.quiet {
            settings.level = LogLevel::Warn;
        } else if self.verbose {
            settings.level = LogLevel::Debug;
        }

        settings
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["linecam"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Watch(_)));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["linecam", "-c", "/etc/linecam/line1.yaml", "qr"]);
        assert_eq!(cli.config, PathBuf::from("/etc/linecam/line1.yaml"));
        assert!(matches!(cli.command, Some(Commands::Qr)));
    }

    #[test]
    fn test_trigger_durations() {
        let cli = Cli::parse_from(["linecam", "trigger", "--pulse", "200ms", "--min-gap", "2s"]);
        let Some(Commands::Trigger(args)) = cli.command else {
            panic!("Expected Trigger command");
        };
        assert_eq!(args.pulse, Some(Duration::from_millis(200)));
        assert_eq!(args.min_gap, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_pulse_bit_positional() {
        let cli = Cli::parse_from(["linecam", "pulse-bit", "2001", "3"]);
        let Some(Commands::PulseBit(args)) = cli.command else {
            panic!("Expected PulseBit command");
        };
        assert_eq!(args.register, Some(2001));
        assert_eq!(args.bit, Some(3));

        let cli = Cli::parse_from(["linecam", "pulse-bit"]);
        let Some(Commands::PulseBit(args)) = cli.command else {
            panic!("Expected PulseBit command");
        };
        assert!(args.register.is_none());
    }

    #[test]
    fn test_pulse_bit_register_requires_bit() {
        assert!(Cli::try_parse_from(["linecam", "pulse-bit", "2001"]).is_err());
    }

    #[test]
    fn test_fire_defaults() {
        let cli = Cli::parse_from(["linecam", "fire"]);
        let Some(Commands::Fire(args)) = cli.command else {
            panic!("Expected Fire command");
        };
        assert_eq!(args.value, 1);
        assert!(!args.release);
    }

    #[test]
    fn test_work_order_flags_conflict() {
        assert!(Cli::try_parse_from(["linecam", "work-order", "--ready", "--clear"]).is_err());
    }

    #[test]
    fn test_logging_settings_merge() {
        let file = LoggingSettings {
            level: LogLevel::Error,
            ..LoggingSettings::default()
        };

        let cli = Cli::parse_from(["linecam", "version"]);
        assert_eq!(cli.logging_settings(Some(&file)).level, LogLevel::Error);

        let cli = Cli::parse_from(["linecam", "-l", "debug", "--log-format", "json", "version"]);
        let merged = cli.logging_settings(Some(&file));
        assert_eq!(merged.level, LogLevel::Debug);
        assert_eq!(merged.format, linecam_config::LogFormat::Json);

        let cli = Cli::parse_from(["linecam", "-q", "version"]);
        assert_eq!(cli.logging_settings(None).level, LogLevel::Warn);
    }

    #[test]
    fn test_output_format() {
        let cli = Cli::parse_from(["linecam", "-o", "json", "signals"]);
        assert_eq!(cli.output, OutputFormat::Json);
    }
}
