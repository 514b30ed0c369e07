// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value types shared by the client.
//!
//! - [`RegisterBit`]: a `(register, bit)` pair; never addressed as loose primitives
//! - [`TriState`]: inspection verdict decoded from a raw register value
//! - [`Endpoint`]: host, port and station id of the PLC
//! - [`PlcOptions`]: the raw configuration snapshot as delivered by callers
//! - [`TimingSettings`]: timeouts and fixed delays

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModbusError, ModbusResult};

// =============================================================================
// Defaults
// =============================================================================

/// Factory defaults for every configurable address.
///
/// Invalid configuration values fall back to these, never to the previous
/// snapshot.
pub mod defaults {
    /// PLC address.
    pub const IP: &str = "192.168.1.81";
    /// Modbus/TCP port.
    pub const PORT: u16 = 502;
    /// Station id.
    pub const SLAVE_ID: u8 = 1;
    /// Candidate trigger coils, tried in order.
    pub const TRIGGER_ADDRESSES: [u16; 3] = [0x0000, 0x0001, 0x0002];

    /// PASS signal register.
    pub const PASS_REGISTER: u16 = 3000;
    /// FAIL signal register.
    pub const FAIL_REGISTER: u16 = 3001;
    /// QR text start register.
    pub const QR_REGISTER: u16 = 5000;
    /// QR text capacity in characters.
    pub const QR_LENGTH: u16 = 40;
    /// Upper bound for the QR capacity.
    pub const QR_LENGTH_MAX: u16 = 256;

    /// Work-order ready register.
    pub const WORK_ORDER_READY_REGISTER: u16 = 100;
    /// Work-order missing register.
    pub const WORK_ORDER_MISSING_REGISTER: u16 = 103;
    /// Manual trigger register.
    pub const MANUAL_TRIGGER_REGISTER: u16 = 102;

    /// External trigger guard register.
    pub const GUARD_REGISTER: u16 = 500;
    /// Guard register value that means "active".
    pub const GUARD_VALUE: u16 = 1;
    /// External trigger fire register.
    pub const FIRE_REGISTER: u16 = 550;
    /// External trigger signal register.
    pub const SIGNAL_REGISTER: u16 = 2000;
    /// External trigger ready register.
    pub const READY_REGISTER: u16 = 1000;

    /// Camera trigger flag (1 = triggered, 0 = idle).
    pub const TRIGGER_FLAG_REGISTER: u16 = 4096;
    /// Camera result register (1 = PASS, 2 = FAIL).
    pub const RESULT_REGISTER: u16 = 4112;
    /// First camera barcode register.
    pub const BARCODE_START: u16 = 4114;
    /// Camera barcode length in characters.
    pub const BARCODE_CHARS: u16 = 23;
    /// Words per barcode character.
    pub const BARCODE_WORDS_PER_CHAR: u16 = 2;
    /// Input register holding the result on older camera models.
    pub const INPUT_FALLBACK_REGISTER: u16 = 0x1000;

    /// Result reads taken before a verdict is committed.
    pub const STABILIZE_ATTEMPTS: u32 = 2;
    /// Maximum registers per FC03/FC04 request.
    pub const MAX_READ_REGISTERS: u16 = 125;
}

// =============================================================================
// RegisterBit
// =============================================================================

/// A single bit inside a holding register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterBit {
    register: u16,
    bit: u8,
}

impl RegisterBit {
    /// Highest valid bit index.
    pub const MAX_BIT: u8 = 15;

    /// Creates a register bit, rejecting indices above 15.
    pub fn new(register: u16, bit: u8) -> ModbusResult<Self> {
        if bit > Self::MAX_BIT {
            return Err(ModbusError::configuration(ConfigurationError::InvalidBit { bit }));
        }
        Ok(Self { register, bit })
    }

    /// Creates a register bit, clamping the index into 0..=15.
    pub fn clamped(register: u16, bit: i64) -> Self {
        Self {
            register,
            bit: bit.clamp(0, i64::from(Self::MAX_BIT)) as u8,
        }
    }

    /// Returns the register address.
    #[inline]
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Returns the bit index.
    #[inline]
    pub fn bit(&self) -> u8 {
        self.bit
    }

    /// Returns the single-bit mask.
    #[inline]
    pub fn mask(&self) -> u16 {
        1u16 << self.bit
    }

    /// Tests this bit in a raw register value.
    #[inline]
    pub fn is_set(&self, value: u16) -> bool {
        value & self.mask() != 0
    }
}

impl fmt::Display for RegisterBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}.{}", self.register, self.bit)
    }
}

// =============================================================================
// TriState
// =============================================================================

/// Inspection verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriState {
    /// Part passed.
    Pass,
    /// Part failed.
    Fail,
    /// No decisive verdict.
    #[default]
    Unknown,
}

impl TriState {
    /// Decodes a raw register value: 1 = PASS, 2 = FAIL, anything else = UNKNOWN.
    pub fn from_raw(value: u16) -> Self {
        match value {
            1 => Self::Pass,
            2 => Self::Fail,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for PASS or FAIL.
    #[inline]
    pub fn is_decisive(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Combines the discrete pass/fail signals. Both set counts as FAIL.
    pub fn from_signals(pass: bool, fail: bool) -> Self {
        match (pass, fail) {
            (_, true) => Self::Fail,
            (true, false) => Self::Pass,
            (false, false) => Self::Unknown,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Network identity of the PLC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Modbus station id.
    pub slave_id: u8,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16, slave_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            slave_id,
        }
    }

    /// Returns `host:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns `true` if host or port differ. Station id changes do not
    /// require a new socket.
    pub fn differs_from(&self, other: &Endpoint) -> bool {
        self.host != other.host || self.port != other.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(defaults::IP, defaults::PORT, defaults::SLAVE_ID)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (slave {})", self.host, self.port, self.slave_id)
    }
}

// =============================================================================
// TimingSettings
// =============================================================================

/// Timeouts and fixed delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// TCP connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-request read timeout.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Per-request write timeout.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Idle time before the first keepalive probe.
    #[serde(with = "humantime_serde")]
    pub keepalive_time: Duration,

    /// Interval between keepalive probes.
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,

    /// Timeout of the throwaway TCP reachability probe.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Minimum interval between repeated transport warnings.
    #[serde(with = "humantime_serde")]
    pub warn_interval: Duration,

    /// Delay between the 0 and 1 writes of an external trigger raise.
    #[serde(with = "humantime_serde")]
    pub raise_delay: Duration,

    /// Settle delay before the camera barcode is read.
    #[serde(with = "humantime_serde")]
    pub barcode_settle: Duration,

    /// Delay between stabilized result reads.
    #[serde(with = "humantime_serde")]
    pub stabilize_delay: Duration,

    /// Default pulse width for triggers and bit pulses.
    #[serde(with = "humantime_serde")]
    pub pulse: Duration,

    /// Minimum gap between two successful coil triggers.
    #[serde(with = "humantime_serde")]
    pub trigger_min_gap: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            keepalive_time: Duration::from_secs(20),
            keepalive_interval: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(900),
            warn_interval: Duration::from_millis(2500),
            raise_delay: Duration::from_millis(50),
            barcode_settle: Duration::from_millis(80),
            stabilize_delay: Duration::from_millis(60),
            pulse: Duration::from_millis(120),
            trigger_min_gap: Duration::from_millis(1500),
        }
    }
}

// =============================================================================
// PlcOptions
// =============================================================================

/// Raw configuration snapshot.
///
/// Numeric fields are deliberately wide and signed so that out-of-range input
/// survives deserialization and can be normalized by
/// [`RegisterMap::from_options`](crate::register_map::RegisterMap::from_options).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcOptions {
    /// PLC host.
    pub ip: String,
    /// PLC port.
    pub port: i64,
    /// Station id.
    pub slave_id: i64,
    /// Candidate trigger coils, tried in order.
    pub trigger_addresses: Vec<u16>,

    /// PASS signal register.
    pub pass_register: i64,
    /// PASS signal bit.
    pub pass_bit: i64,
    /// FAIL signal register.
    pub fail_register: i64,
    /// FAIL signal bit.
    pub fail_bit: i64,

    /// QR text start register.
    pub qr_register: i64,
    /// QR text capacity in characters.
    pub qr_length: i64,

    /// Work-order ready register.
    pub work_order_ready_register: i64,
    /// Work-order missing register.
    pub work_order_missing_register: i64,
    /// Work-order missing bit.
    pub work_order_missing_bit: i64,

    /// Manual trigger register.
    pub manual_trigger_register: i64,
    /// Manual trigger bit.
    pub manual_trigger_bit: i64,

    /// External trigger guard register.
    pub external_trigger_guard_register: i64,
    /// External trigger guard bit.
    pub external_trigger_guard_bit: i64,
    /// Guard register value that means "active".
    pub external_trigger_guard_value: i64,
    /// External trigger fire register.
    pub external_trigger_fire_register: i64,
    /// External trigger signal register.
    pub external_trigger_signal_register: i64,
    /// External trigger signal bit.
    pub external_trigger_signal_bit: i64,
    /// External trigger ready register.
    pub external_trigger_ready_register: i64,
    /// External trigger ready bit.
    pub external_trigger_ready_bit: i64,

    /// Camera trigger flag register.
    pub trigger_flag_register: i64,
    /// Camera result register.
    pub result_register: i64,
    /// Camera barcode layout.
    pub barcode: BarcodeOptions,

    /// Read the result from an input register when the holding register is
    /// inconclusive.
    pub input_fallback: bool,
    /// Input register used by the fallback.
    pub input_fallback_register: i64,
    /// Result reads taken before a verdict is committed.
    pub stabilize_attempts: i64,

    /// Timeouts and delays.
    pub timing: TimingSettings,
}

impl Default for PlcOptions {
    fn default() -> Self {
        use defaults::*;

        Self {
            ip: IP.to_string(),
            port: i64::from(PORT),
            slave_id: i64::from(SLAVE_ID),
            trigger_addresses: TRIGGER_ADDRESSES.to_vec(),
            pass_register: i64::from(PASS_REGISTER),
            pass_bit: 0,
            fail_register: i64::from(FAIL_REGISTER),
            fail_bit: 0,
            qr_register: i64::from(QR_REGISTER),
            qr_length: i64::from(QR_LENGTH),
            work_order_ready_register: i64::from(WORK_ORDER_READY_REGISTER),
            work_order_missing_register: i64::from(WORK_ORDER_MISSING_REGISTER),
            work_order_missing_bit: 0,
            manual_trigger_register: i64::from(MANUAL_TRIGGER_REGISTER),
            manual_trigger_bit: 0,
            external_trigger_guard_register: i64::from(GUARD_REGISTER),
            external_trigger_guard_bit: 0,
            external_trigger_guard_value: i64::from(GUARD_VALUE),
            external_trigger_fire_register: i64::from(FIRE_REGISTER),
            external_trigger_signal_register: i64::from(SIGNAL_REGISTER),
            external_trigger_signal_bit: 0,
            external_trigger_ready_register: i64::from(READY_REGISTER),
            external_trigger_ready_bit: 0,
            trigger_flag_register: i64::from(TRIGGER_FLAG_REGISTER),
            result_register: i64::from(RESULT_REGISTER),
            barcode: BarcodeOptions::default(),
            input_fallback: false,
            input_fallback_register: i64::from(INPUT_FALLBACK_REGISTER),
            stabilize_attempts: i64::from(STABILIZE_ATTEMPTS),
            timing: TimingSettings::default(),
        }
    }
}

/// Camera barcode layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeOptions {
    /// First register.
    pub start: i64,
    /// Number of characters.
    pub chars: i64,
    /// Registers per character.
    pub words_per_char: i64,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            start: i64::from(defaults::BARCODE_START),
            chars: i64::from(defaults::BARCODE_CHARS),
            words_per_char: i64::from(defaults::BARCODE_WORDS_PER_CHAR),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_bit_rejects_bit_16() {
        assert!(RegisterBit::new(100, 15).is_ok());
        let err = RegisterBit::new(100, 16).unwrap_err();
        assert!(matches!(
            err,
            ModbusError::Configuration(ConfigurationError::InvalidBit { bit: 16 })
        ));
    }

    #[test]
    fn test_register_bit_clamped() {
        assert_eq!(RegisterBit::clamped(1, -3).bit(), 0);
        assert_eq!(RegisterBit::clamped(1, 99).bit(), 15);
        assert_eq!(RegisterBit::clamped(1, 7).bit(), 7);
    }

    #[test]
    fn test_register_bit_mask() {
        let rb = RegisterBit::clamped(3000, 3);
        assert_eq!(rb.mask(), 0b1000);
        assert!(rb.is_set(0b1010));
        assert!(!rb.is_set(0b0010));
        assert_eq!(rb.to_string(), "D3000.3");
    }

    #[test]
    fn test_tristate_from_raw() {
        assert_eq!(TriState::from_raw(1), TriState::Pass);
        assert_eq!(TriState::from_raw(2), TriState::Fail);
        assert_eq!(TriState::from_raw(0), TriState::Unknown);
        assert_eq!(TriState::from_raw(7), TriState::Unknown);
    }

    #[test]
    fn test_tristate_from_signals() {
        assert_eq!(TriState::from_signals(true, false), TriState::Pass);
        assert_eq!(TriState::from_signals(false, true), TriState::Fail);
        assert_eq!(TriState::from_signals(true, true), TriState::Fail);
        assert_eq!(TriState::from_signals(false, false), TriState::Unknown);
    }

    #[test]
    fn test_endpoint_differs_ignores_slave() {
        let a = Endpoint::new("10.0.0.1", 502, 1);
        let b = Endpoint::new("10.0.0.1", 502, 7);
        let c = Endpoint::new("10.0.0.1", 5020, 1);
        assert!(!a.differs_from(&b));
        assert!(a.differs_from(&c));
    }

    #[test]
    fn test_timing_humantime_serde() {
        let json = r#"{"read_timeout":"500ms","pulse":"1s"}"#;
        let timing: TimingSettings = serde_json::from_str(json).unwrap();
        assert_eq!(timing.read_timeout, Duration::from_millis(500));
        assert_eq!(timing.pulse, Duration::from_secs(1));
        assert_eq!(timing.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_options_partial_deserialize() {
        let opts: PlcOptions = serde_json::from_str(r#"{"ip":"10.1.1.1","pass_bit":42}"#).unwrap();
        assert_eq!(opts.ip, "10.1.1.1");
        assert_eq!(opts.pass_bit, 42);
        assert_eq!(opts.port, 502);
        assert_eq!(opts.trigger_addresses, vec![0, 1, 2]);
    }
}
