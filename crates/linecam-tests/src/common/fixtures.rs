// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pre-built test data.

use std::time::Duration;

use linecam_config::{AppConfig, PollSettings};
use linecam_modbus::PlcOptions;

/// Host used by every fixture.
pub const TEST_HOST: &str = "10.0.0.5";

/// PLC options pointing at [`TEST_HOST`] with factory register addresses.
pub fn plc_options() -> PlcOptions {
    PlcOptions {
        ip: TEST_HOST.to_string(),
        ..PlcOptions::default()
    }
}

/// Poll settings with short intervals.
pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(50),
        reload_interval: Duration::from_millis(100),
        connection_check_interval: Duration::from_secs(1),
        ..PollSettings::default()
    }
}

/// A full configuration built from the fixtures above.
pub fn app_config() -> AppConfig {
    AppConfig {
        plc: plc_options(),
        poll: fast_poll(),
        ..AppConfig::default()
    }
}

/// Packs text two characters per word, first character in the low byte.
pub fn pack_low_first(text: &str) -> Vec<u16> {
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let low = u16::from(pair[0]);
            let high = pair.get(1).map(|&b| u16::from(b)).unwrap_or(0);
            (high << 8) | low
        })
        .collect()
}

/// A YAML document for `ip`, with fast polling.
pub fn config_yaml(ip: &str) -> String {
    format!(
        r#"
plc:
  ip: {ip}
  port: 502
  slave_id: 1

poll:
  interval: 50ms
  reload_interval: 100ms
  connection_check_interval: 1s

logging:
  level: warn
"#
    )
}
