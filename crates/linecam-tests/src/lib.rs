// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # linecam Integration Tests
//!
//! Integration tests for the PLC / camera client, run against an in-memory
//! device instead of a real PLC.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Options, poll settings and config documents
//!   - `mocks`: [`MockPlc`](common::MockPlc), an in-memory Modbus device
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p linecam-tests
//!
//! # Run specific test suite
//! cargo test -p linecam-tests --test integration_service
//! cargo test -p linecam-tests --test integration_client
//! cargo test -p linecam-tests --test integration_config
//! cargo test -p linecam-tests --test integration_runtime
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use linecam_tests::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let plc = MockPlc::new();
//!     plc.set_holding(4112, 1);
//!     let service = plc.service(&plc_options());
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir, wait_until};
}
