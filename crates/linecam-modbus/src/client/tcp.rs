// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP link using tokio-modbus.
//!
//! tokio-modbus performs no retries of its own; recovery is the serializer's
//! job.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{Context as ModbusContext, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, ExceptionCode};

use crate::error::{ConnectionError, ModbusError, ModbusResult, TimeoutError};
use crate::types::{Endpoint, TimingSettings};

use super::transport::{Connector, ModbusTransport};

const FC_READ_HOLDING: u8 = 0x03;
const FC_READ_INPUT: u8 = 0x04;
const FC_WRITE_COIL: u8 = 0x05;
const FC_WRITE_REGISTER: u8 = 0x06;

// =============================================================================
// TcpConnector
// =============================================================================

/// Dials Modbus/TCP links with `TCP_NODELAY` and OS keepalive enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timing: &TimingSettings,
    ) -> ModbusResult<Box<dyn ModbusTransport>> {
        let addr = endpoint.socket_addr();

        let stream = timeout(timing.connect_timeout, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| {
                ModbusError::timeout(TimeoutError::connection(&addr, timing.connect_timeout))
            })?
            .map_err(|e| {
                ModbusError::connection(ConnectionError::refused_with(
                    &endpoint.host,
                    endpoint.port,
                    e,
                ))
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(peer = %addr, error = %e, "Failed to enable TCP_NODELAY");
        }
        if let Err(e) = enable_keepalive(&stream, timing) {
            tracing::warn!(peer = %addr, error = %e, "Failed to enable TCP keepalive");
        }

        let ctx = tcp::attach_slave(stream, Slave(endpoint.slave_id));

        tracing::info!(
            host = %endpoint.host,
            port = endpoint.port,
            slave_id = endpoint.slave_id,
            "Connected to PLC"
        );

        Ok(Box::new(TcpLink {
            ctx,
            peer: addr,
            read_timeout: timing.read_timeout,
            write_timeout: timing.write_timeout,
            healthy: true,
        }))
    }

    async fn probe(&self, endpoint: &Endpoint, limit: Duration) -> bool {
        probe_tcp(endpoint, limit).await
    }
}

fn enable_keepalive(stream: &TcpStream, timing: &TimingSettings) -> io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(timing.keepalive_time)
        .with_interval(timing.keepalive_interval);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Opens and drops a throwaway TCP connection.
pub async fn probe_tcp(endpoint: &Endpoint, limit: Duration) -> bool {
    let reachable = matches!(
        timeout(limit, TcpStream::connect(endpoint.socket_addr())).await,
        Ok(Ok(_))
    );
    tracing::debug!(endpoint = %endpoint, reachable, "TCP probe");
    reachable
}

// =============================================================================
// TcpLink
// =============================================================================

/// One open Modbus/TCP link.
pub struct TcpLink {
    ctx: ModbusContext,
    peer: String,
    read_timeout: Duration,
    write_timeout: Duration,
    healthy: bool,
}

impl TcpLink {
    fn settle<T>(&mut self, result: tokio_modbus::Result<T>, function_code: u8) -> ModbusResult<T> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(exception)) => Err(ModbusError::exception(
                function_code,
                exception_code_to_u8(exception),
            )),
            Err(error) => {
                self.healthy = false;
                Err(map_transport_error(error))
            }
        }
    }

    fn read_timed_out(&mut self) -> ModbusError {
        self.healthy = false;
        ModbusError::timeout(TimeoutError::read(self.read_timeout))
    }

    fn write_timed_out(&mut self) -> ModbusError {
        self.healthy = false;
        ModbusError::timeout(TimeoutError::write(self.write_timeout))
    }
}

#[async_trait]
impl ModbusTransport for TcpLink {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let outcome = timeout(self.read_timeout, self.ctx.read_holding_registers(address, count)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => return Err(self.read_timed_out()),
        };
        self.settle(result, FC_READ_HOLDING)
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let outcome = timeout(self.read_timeout, self.ctx.read_input_registers(address, count)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => return Err(self.read_timed_out()),
        };
        self.settle(result, FC_READ_INPUT)
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        let outcome = timeout(self.write_timeout, self.ctx.write_single_register(address, value)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => return Err(self.write_timed_out()),
        };
        self.settle(result, FC_WRITE_REGISTER)
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        let outcome = timeout(self.write_timeout, self.ctx.write_single_coil(address, value)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => return Err(self.write_timed_out()),
        };
        self.settle(result, FC_WRITE_COIL)
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.healthy = false;
        if let Err(e) = self.ctx.disconnect().await {
            tracing::debug!(peer = %self.peer, error = %e, "Error disconnecting from PLC");
        }
        tracing::debug!(peer = %self.peer, "Disconnected from PLC");
        Ok(())
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.ctx.set_slave(Slave(slave_id));
    }

    fn set_timeouts(&mut self, read: Duration, write: Duration) {
        tracing::debug!(peer = %self.peer, ?read, ?write, "Request timeouts updated");
        self.read_timeout = read;
        self.write_timeout = write;
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Every non-exception failure from tokio-modbus is a transport fault;
/// framing mismatches included, since the stream can no longer be trusted.
fn map_transport_error(error: TokioModbusError) -> ModbusError {
    match error {
        TokioModbusError::Transport(io_error) => map_io_error(io_error),
        TokioModbusError::Protocol(protocol_error) => {
            ModbusError::connection(ConnectionError::Framing {
                message: protocol_error.to_string(),
            })
        }
    }
}

fn map_io_error(error: io::Error) -> ModbusError {
    use io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::UnexpectedEof => {
            ModbusError::connection(ConnectionError::closed(error.to_string()))
        }
        ErrorKind::BrokenPipe => ModbusError::connection(ConnectionError::closed("broken pipe")),
        ErrorKind::NotConnected => ModbusError::not_connected(),
        _ => ModbusError::connection(ConnectionError::io("request", error)),
    }
}

fn exception_code_to_u8(code: ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultClass;

    #[test]
    fn test_io_errors_are_transport_faults() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::NotConnected,
            io::ErrorKind::Other,
        ] {
            let mapped = map_transport_error(TokioModbusError::Transport(io::Error::new(kind, "x")));
            assert_eq!(mapped.fault_class(), FaultClass::Transport, "{kind:?}");
        }
    }

    #[test]
    fn test_exception_codes() {
        assert_eq!(exception_code_to_u8(ExceptionCode::IllegalDataAddress), 0x02);
        assert_eq!(exception_code_to_u8(ExceptionCode::ServerDeviceFailure), 0x04);
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port, 1);
        assert!(probe_tcp(&endpoint, Duration::from_millis(500)).await);

        drop(listener);
        assert!(!probe_tcp(&endpoint, Duration::from_millis(500)).await);
    }
}
