// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors of the `linecam` command and its exit-code contract.
//!
//! Every command returns [`BinResult`]; `main` turns an error into a process
//! exit code so shell scripts on the line PC can branch on the cause:
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success, including a device answering with a negative result in `watch` |
//! | 1 | configuration missing, unparsable or rejected by validation |
//! | 2 | logging or runtime could not start |
//! | 3 | a command was dispatched to the wrong handler |
//! | 4 | local I/O failed (reading the config, writing output) |
//! | 5 | a one-shot device command was refused or unreachable |
//! | 6 | a raw Modbus call failed (`read` propagates device faults) |

use thiserror::Error;

/// Process exit codes.
pub mod exit {
    /// Configuration could not be loaded or validated.
    pub const CONFIG: i32 = 1;
    /// Startup failed.
    pub const INIT: i32 = 2;
    /// Internal dispatch failure.
    pub const RUNTIME: i32 = 3;
    /// Local I/O failure.
    pub const IO: i32 = 4;
    /// The device answered a one-shot command negatively.
    pub const DEVICE: i32 = 5;
    /// A raw Modbus call failed.
    pub const MODBUS: i32 = 6;
}

/// Result type alias for `linecam` commands.
pub type BinResult<T> = Result<T, BinError>;

/// Why a `linecam` command failed.
#[derive(Debug, Error)]
pub enum BinError {
    /// A config value failed validation or no config file was found.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Logging setup failed.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Internal dispatch failure.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Reading the config file or writing command output failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A trigger, pulse or write came back negative. The service degrades
    /// device faults to `false`, so this is the only trace of them at the
    /// command line.
    #[error("Device error: {0}")]
    Device(String),

    /// The loader rejected the file or an environment override.
    #[error("Config error: {0}")]
    Config(#[from] linecam_config::ConfigError),

    /// Argument errors, cancellation, and raw-read device faults.
    #[error("Modbus error: {0}")]
    Modbus(#[from] linecam_modbus::ModbusError),

    /// An error annotated with what the command was doing.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done, e.g. `loading line.yaml`.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates a device error for the named command.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Wraps `self` with what the command was doing.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Maps this error onto the [`exit`] codes. Context wrappers report the
    /// code of the error they wrap.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => exit::CONFIG,
            Self::Initialization(_) => exit::INIT,
            Self::Runtime(_) => exit::RUNTIME,
            Self::Io(_) => exit::IO,
            Self::Device(_) => exit::DEVICE,
            Self::Modbus(linecam_modbus::ModbusError::Configuration(_)) => exit::CONFIG,
            Self::Modbus(_) => exit::MODBUS,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints `error` and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Prints `error` and exits with its [`exit_code`](BinError::exit_code).
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
