// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use linecam_config::{LogFormat, LoggingSettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{BinError, BinResult};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem.
///
/// `RUST_LOG` wins over the configured level when set.
///
/// ```ignore
/// use linecam_bin::logging::init_logging;
/// use linecam_config::LoggingSettings;
///
/// init_logging(&LoggingSettings::default())?;
/// ```
pub fn init_logging(settings: &LoggingSettings) -> BinResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(settings)));

    let result = match settings.format {
        LogFormat::Text => init_text_logging(env_filter, settings),
        LogFormat::Json => init_json_logging(env_filter, settings),
        LogFormat::Compact => init_compact_logging(env_filter),
    };

    result.map_err(|e| BinError::init(format!("Failed to initialize logging: {}", e)))
}

/// Builds the default filter: the configured level, with the protocol
/// crate's own chatter held at `warn`.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    format!("{},tokio_modbus=warn", settings.level.as_str())
}

type InitResult = Result<(), tracing_subscriber::util::TryInitError>;

fn init_text_logging(filter: EnvFilter, settings: &LoggingSettings) -> InitResult {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(settings.with_target)
                .with_thread_ids(settings.with_thread_ids)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(is_terminal),
        )
        .try_init()
}

fn init_json_logging(filter: EnvFilter, settings: &LoggingSettings) -> InitResult {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_target(settings.with_target)
                .with_thread_ids(settings.with_thread_ids)
                .with_current_span(true)
                .with_span_list(false),
        )
        .try_init()
}

fn init_compact_logging(filter: EnvFilter) -> InitResult {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(is_terminal),
        )
        .try_init()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use linecam_config::LogLevel;

    #[test]
    fn test_filter_directives() {
        let settings = LoggingSettings {
            level: LogLevel::Debug,
            ..LoggingSettings::default()
        };
        assert_eq!(filter_directives(&settings), "debug,tokio_modbus=warn");
    }
}
