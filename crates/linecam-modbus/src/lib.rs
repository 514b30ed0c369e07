// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # linecam-modbus
//!
//! Stateful Modbus/TCP client for a production-line PLC that fronts a
//! vision-inspection camera.
//!
//! The crate provides:
//!
//! - **One serialized link**: every request is funnelled through a single
//!   bus lock so exactly one transaction is on the wire at a time
//! - **Lazy reconnection**: links are opened on demand and replaced after a
//!   transport fault, with one automatic retry for idempotent operations
//! - **Restoring pulses**: bit and register pulses always write back the
//!   original value, even if the caller stops waiting
//! - **Debounced triggering**: a cooldown and an in-flight guard keep the
//!   camera from being fired twice
//! - **Text decoding**: QR and barcode text recovered from register words
//!   with automatic byte-order detection
//! - **Hot reconfiguration**: the register map can be swapped at runtime
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PlcService                             │
//! │          (caller-facing API, negative-result policy)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────────┐
//! │       SignalOperations        │ │       TriggerController       │
//! │ (pulses, stabilized reads)    │ │   (cooldown, in-flight)       │
//! └───────────────────────────────┘ └───────────────────────────────┘
//!                 │                               │
//!                 └───────────────┬───────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      RequestSerializer                          │
//! │               (bus lock, retry-once policy)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      TransportManager                           │
//! │                 (connect, invalidate, probe)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linecam_modbus::{PlcOptions, PlcService};
//!
//! let service = PlcService::new(&PlcOptions {
//!     ip: "192.168.1.81".into(),
//!     ..PlcOptions::default()
//! });
//!
//! if service.trigger_once().await? {
//!     let verdict = service.read_result_status(true).await?;
//!     let barcode = service.read_default_camera_barcode().await?;
//!     println!("{barcode}: {verdict}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod codec;
pub mod error;
pub mod register_map;
pub mod service;
pub mod signals;
pub mod trigger;
pub mod types;

// =============================================================================
// Re-exports - Error Module
// =============================================================================

pub use error::{
    // Main error type
    ModbusError,
    ModbusResult,
    FaultClass,
    // Error categories
    ConfigurationError,
    ConnectionError,
    ProtocolError,
    TimeoutError,
    // Error metadata
    ErrorCode,
    ErrorSeverity,
};

// =============================================================================
// Re-exports - Types Module
// =============================================================================

pub use types::{
    defaults,
    BarcodeOptions,
    Endpoint,
    PlcOptions,
    RegisterBit,
    TimingSettings,
    TriState,
};

// =============================================================================
// Re-exports - Client Module
// =============================================================================

pub use client::{
    // Transport
    Connector,
    ModbusTransport,
    TransportState,
    TcpConnector,
    // Connection
    TransportManager,
    RequestSerializer,
    StatsSnapshot,
    // Retry
    RetryPolicy,
    WarnThrottle,
};

// =============================================================================
// Re-exports - Domain
// =============================================================================

pub use codec::{ByteOrder, DecodedText};
pub use register_map::{MapUpdate, RegisterMap, SharedRegisterMap};
pub use service::{CameraStatus, PlcService};
pub use signals::SignalOperations;
pub use trigger::{TriggerController, TriggerOutcome, TriggerRejection};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
