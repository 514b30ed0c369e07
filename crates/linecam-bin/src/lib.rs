// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # linecam-bin
//!
//! Command-line front end for the line camera Modbus client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └────┬─────┘ └────┬─────┘ └──────────┘
//!             │            │
//!             │     ┌──────▼──────┐
//!             │     │  shutdown   │
//!             │     └─────────────┘
//!             │
//!      ┌──────┴───────────────┐
//!      │ linecam-modbus       │
//!      │ linecam-config       │
//!      └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll the PLC and report inspection cycles (default command)
//! linecam
//!
//! # One-shot camera trigger
//! linecam -c /etc/linecam/line1.yaml trigger
//!
//! # Read the verdict and clear it
//! linecam result --clear
//!
//! # Dump raw holding registers
//! linecam read 4096 20
//!
//! # Validate configuration
//! linecam validate --show-map
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{InspectionCycle, WatchRuntime, WatchSummary};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
