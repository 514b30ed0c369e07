// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract link layer.
//!
//! [`ModbusTransport`] is one open link to the PLC; [`Connector`] opens
//! links. Splitting the two lets the serializer and everything above it run
//! against an in-memory device in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ModbusResult;
use crate::types::{Endpoint, TimingSettings};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state as seen from outside the bus lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// No link.
    #[default]
    Disconnected,
    /// A connect attempt is running.
    Connecting,
    /// A link is open.
    Connected,
}

impl TransportState {
    /// Returns `true` if a link is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// One open link to a Modbus device.
///
/// Every method takes `&mut self`: a link is only ever driven by the task
/// holding the bus lock.
///
/// Implementations classify failures: socket, timeout and framing problems
/// surface as [`ModbusError::Connection`](crate::error::ModbusError::Connection)
/// or [`ModbusError::Timeout`](crate::error::ModbusError::Timeout), device
/// exception responses as [`ModbusError::Protocol`](crate::error::ModbusError::Protocol).
#[async_trait]
pub trait ModbusTransport: Send {
    /// Reads holding registers (FC 03).
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Reads input registers (FC 04).
    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Writes a single holding register (FC 06).
    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()>;

    /// Writes a single coil (FC 05).
    async fn write_single_coil(&mut self, address: u16, value: bool) -> ModbusResult<()>;

    /// Closes the link.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Retargets subsequent requests at another station id.
    fn set_slave(&mut self, slave_id: u8);

    /// Replaces the per-request timeouts.
    fn set_timeouts(&mut self, _read: Duration, _write: Duration) {}

    /// Returns `false` once the link has seen a transport fault.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Peer description for logs.
    fn peer(&self) -> String;
}

// =============================================================================
// Connector Trait
// =============================================================================

/// Opens links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dials `endpoint` and returns a ready link.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timing: &TimingSettings,
    ) -> ModbusResult<Box<dyn ModbusTransport>>;

    /// Opens and drops a throwaway socket; `true` if the port accepts.
    async fn probe(&self, endpoint: &Endpoint, limit: Duration) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Disconnected.to_string(), "disconnected");
        assert_eq!(TransportState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_transport_state_u8() {
        for state in [
            TransportState::Disconnected,
            TransportState::Connecting,
            TransportState::Connected,
        ] {
            assert_eq!(TransportState::from_u8(state.to_u8()), state);
        }
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Connecting.is_connected());
    }
}
