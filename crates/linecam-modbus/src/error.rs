// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the PLC / camera client.
//!
//! Every failure is sorted into one of a few fault classes, because the
//! recovery policy depends on the class and not on the exact cause:
//!
//! ```text
//! ModbusError
//! ├── Connection    - socket/I/O faults          (transport fault)
//! ├── Timeout       - connect/read/write timeout (transport fault)
//! ├── Protocol      - device exception response  (protocol fault)
//! ├── Configuration - invalid caller argument
//! ├── Cancelled     - service shut down before the call
//! └── Task          - a detached pulse task panicked
//! ```
//!
//! Transport faults close the connection and are retried at most once.
//! Protocol faults leave the connection open and are never retried.
//!
//! # Examples
//!
//! ```
//! use linecam_modbus::error::{ModbusError, ConnectionError, FaultClass};
//!
//! let error = ModbusError::connection(ConnectionError::refused("192.168.1.81", 502));
//! assert_eq!(error.fault_class(), FaultClass::Transport);
//!
//! let rejected = ModbusError::exception(0x03, 0x02);
//! assert_eq!(rejected.fault_class(), FaultClass::Protocol);
//! assert_eq!(rejected.exception_code(), Some(0x02));
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// ModbusError - Main Error Type
// =============================================================================

/// The main error type for device operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Connection-level failure (refused, reset, broken pipe, framing).
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The device answered with an exception response.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid argument supplied by the caller.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A connect, read or write deadline elapsed.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// The service was shut down before the operation started.
    #[error("Operation cancelled: service is shut down")]
    Cancelled,

    /// A detached pulse task failed to complete.
    #[error("Pulse task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}

/// How the serializer reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// The link is presumed broken: close it and (maybe) retry once.
    Transport,
    /// The device is reachable but rejected the request: surface it.
    Protocol,
    /// Not a device fault at all.
    Other,
}

impl ModbusError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates an exception response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception_response(function_code, exception_code))
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::invalid_argument(name, reason))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Classifies this error for the retry policy.
    pub fn fault_class(&self) -> FaultClass {
        match self {
            Self::Connection(_) | Self::Timeout(_) => FaultClass::Transport,
            Self::Protocol(_) => FaultClass::Protocol,
            Self::Configuration(_) | Self::Cancelled | Self::Task { .. } => FaultClass::Other,
        }
    }

    /// Returns `true` for faults that mean the connection is broken.
    #[inline]
    pub fn is_transport(&self) -> bool {
        self.fault_class() == FaultClass::Transport
    }

    /// Returns `true` for exception responses from a reachable device.
    #[inline]
    pub fn is_protocol(&self) -> bool {
        self.fault_class() == FaultClass::Protocol
    }

    /// Returns the Modbus exception code, if this is an exception response.
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::Protocol(ProtocolError::ExceptionResponse { exception_code, .. }) => {
                Some(*exception_code)
            }
            _ => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Protocol(_) => ErrorSeverity::Warning,
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Error,
            Self::Cancelled => ErrorSeverity::Info,
            Self::Task { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Configuration(_) => "configuration",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Task { .. } => "task",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Protocol(e) => e.error_code(),
            Self::Configuration(_) => ErrorCode::new(5, 1),
            Self::Timeout(e) => e.error_code(),
            Self::Cancelled => ErrorCode::new(7, 1),
            Self::Task { .. } => ErrorCode::new(7, 2),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// TCP connection refused or failed to open.
    #[error("Connection refused to {host}:{port}")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Underlying error.
        #[source]
        source: Option<io::Error>,
    },

    /// Connection closed or reset by the peer.
    #[error("Connection closed unexpectedly: {reason}")]
    Closed {
        /// Reason for closure.
        reason: String,
    },

    /// The response did not match the request (framing or header mismatch).
    #[error("Malformed response: {message}")]
    Framing {
        /// Description from the protocol stack.
        message: String,
    },

    /// Not connected.
    #[error("Not connected to Modbus device")]
    NotConnected,

    /// Generic I/O error.
    #[error("I/O error during {operation}: {source}")]
    Io {
        /// Operation that failed.
        operation: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(host: impl Into<String>, port: u16) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Creates a connection refused error with source.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Closed { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::Closed { .. } => ErrorCode::new(1, 8),
            Self::NotConnected => ErrorCode::new(1, 9),
            Self::Io { .. } => ErrorCode::new(1, 10),
            Self::Framing { .. } => ErrorCode::new(1, 11),
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Modbus protocol-level errors reported by a reachable device.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Modbus exception response received.
    #[error("Modbus exception: function code {function_code:#04x}, exception {exception_code} ({exception_name})")]
    ExceptionResponse {
        /// The function code that caused the exception.
        function_code: u8,
        /// The exception code.
        exception_code: u8,
        /// Human-readable exception name.
        exception_name: String,
    },
}

impl ProtocolError {
    /// Creates an exception response error.
    pub fn exception_response(function_code: u8, exception_code: u8) -> Self {
        Self::ExceptionResponse {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code).to_string(),
        }
    }

    /// Returns the human-readable name for an exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Slave Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Slave Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target Device Failed to Respond",
            _ => "Unknown Exception",
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ExceptionResponse { exception_code, .. } => {
                ErrorCode::new(2, *exception_code)
            }
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid arguments passed to the operation surface.
///
/// Configuration *snapshots* never produce these; they are normalized instead.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Bit index outside 0..=15.
    #[error("Invalid bit index {bit}: must be 0-15")]
    InvalidBit {
        /// The rejected bit index.
        bit: u8,
    },

    /// Any other invalid argument.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Timeout errors.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// Connection timeout.
    #[error("Connection to {target} timed out after {duration:?}")]
    Connection {
        /// Target address.
        target: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// Read operation timeout.
    #[error("Read operation timed out after {duration:?}")]
    Read {
        /// Timeout duration.
        duration: Duration,
    },

    /// Write operation timeout.
    #[error("Write operation timed out after {duration:?}")]
    Write {
        /// Timeout duration.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Creates a connection timeout.
    pub fn connection(target: impl Into<String>, duration: Duration) -> Self {
        Self::Connection {
            target: target.into(),
            duration,
        }
    }

    /// Creates a read timeout.
    pub fn read(duration: Duration) -> Self {
        Self::Read { duration }
    }

    /// Creates a write timeout.
    pub fn write(duration: Duration) -> Self {
        Self::Write { duration }
    }

    /// Returns the timeout duration.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Connection { duration, .. } | Self::Read { duration } | Self::Write { duration } => {
                *duration
            }
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection { .. } => ErrorCode::new(6, 1),
            Self::Read { .. } => ErrorCode::new(6, 2),
            Self::Write { .. } => ErrorCode::new(6, 3),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1=connection, 2=protocol, 5=argument, 6=timeout, 7=lifecycle).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LC-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with ModbusError.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classes() {
        assert_eq!(ModbusError::not_connected().fault_class(), FaultClass::Transport);
        assert_eq!(
            ModbusError::timeout(TimeoutError::read(Duration::from_secs(2))).fault_class(),
            FaultClass::Transport
        );
        assert_eq!(
            ModbusError::connection(ConnectionError::Framing {
                message: "header mismatch".into()
            })
            .fault_class(),
            FaultClass::Transport
        );
        assert_eq!(ModbusError::exception(0x06, 0x02).fault_class(), FaultClass::Protocol);
        assert_eq!(
            ModbusError::invalid_argument("bit", "too large").fault_class(),
            FaultClass::Other
        );
        assert_eq!(ModbusError::Cancelled.fault_class(), FaultClass::Other);
    }

    #[test]
    fn test_exception_code_extraction() {
        assert_eq!(ModbusError::exception(0x03, 0x04).exception_code(), Some(0x04));
        assert_eq!(ModbusError::not_connected().exception_code(), None);
    }

    #[test]
    fn test_protocol_error_exception_names() {
        assert_eq!(ProtocolError::exception_name(0x01), "Illegal Function");
        assert_eq!(ProtocolError::exception_name(0x02), "Illegal Data Address");
        assert_eq!(ProtocolError::exception_name(0x7F), "Unknown Exception");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::new(1, 5).to_string(), "LC-0105");
        assert_eq!(ModbusError::exception(0x05, 0x02).error_code().to_string(), "LC-0202");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(ModbusError::not_connected().category(), "connection");
        assert_eq!(ModbusError::exception(0x03, 0x02).category(), "protocol");
        assert_eq!(
            ModbusError::timeout(TimeoutError::write(Duration::from_secs(1))).category(),
            "timeout"
        );
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ModbusError::not_connected().severity(), ErrorSeverity::Warning);
        assert_eq!(ModbusError::Cancelled.tracing_level(), Level::INFO);
        assert_eq!(
            ModbusError::Task { message: "panicked".into() }.tracing_level(),
            Level::ERROR
        );
    }
}
