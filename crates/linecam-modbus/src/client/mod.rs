// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection handling and request serialization.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     RequestSerializer                           │
//! │       (bus lock, retry-once policy, throttled warnings)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     TransportManager                            │
//! │   (ConnectionState, double-checked connect, invalidation)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────┐             ┌─────────────────────┐
//! │    TcpConnector     │             │   test connectors   │
//! │   (tokio-modbus)    │             │     (in-memory)     │
//! └─────────────────────┘             └─────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use linecam_modbus::client::{RequestSerializer, RetryPolicy, TcpConnector, TransportManager};
//! use linecam_modbus::types::{Endpoint, TimingSettings};
//!
//! let manager = TransportManager::new(
//!     Arc::new(TcpConnector::new()),
//!     Endpoint::new("192.168.1.81", 502, 1),
//!     TimingSettings::default(),
//! );
//! let serializer = RequestSerializer::new(manager);
//!
//! let words = serializer
//!     .execute(RetryPolicy::RetryOnce, |t| {
//!         Box::pin(async move { t.read_holding_registers(4112, 1).await })
//!     })
//!     .await?;
//! ```

mod manager;
mod retry;
mod serializer;
mod tcp;
mod transport;

pub use manager::{ConnectionState, TransportManager};
pub use retry::{RetryPolicy, WarnThrottle};
pub use serializer::{OpFuture, RequestSerializer, StatsSnapshot};
pub use tcp::{probe_tcp, TcpConnector, TcpLink};
pub use transport::{Connector, ModbusTransport, TransportState};
