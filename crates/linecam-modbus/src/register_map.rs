// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Normalized address map.
//!
//! [`RegisterMap`] is an immutable snapshot built from [`PlcOptions`]. Every
//! invalid field is replaced by its factory default, so building a map never
//! fails. [`SharedRegisterMap`] publishes snapshots through an atomic pointer
//! swap; readers never lock and never observe a half-applied update.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::types::{defaults, Endpoint, PlcOptions, RegisterBit, TimingSettings};

// =============================================================================
// RegisterMap
// =============================================================================

/// QR text location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrSpan {
    /// First register.
    pub register: u16,
    /// Capacity in characters (1..=256).
    pub length: u16,
}

impl QrSpan {
    /// Registers needed to hold `length` characters.
    pub fn register_count(&self) -> u16 {
        self.length.div_ceil(2)
    }
}

/// Camera barcode layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodeLayout {
    /// First register.
    pub start: u16,
    /// Number of characters.
    pub chars: u16,
    /// Registers per character.
    pub words_per_char: u16,
}

/// One immutable, normalized configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    /// PLC endpoint.
    pub endpoint: Endpoint,
    /// Candidate trigger coils, never empty.
    pub trigger_addresses: Vec<u16>,
    /// PASS signal.
    pub pass: RegisterBit,
    /// FAIL signal.
    pub fail: RegisterBit,
    /// QR text location.
    pub qr: QrSpan,
    /// Work-order ready register (non-zero = ready).
    pub work_order_ready_register: u16,
    /// Work-order missing flag.
    pub work_order_missing: RegisterBit,
    /// Manual trigger bit.
    pub manual_trigger: RegisterBit,
    /// External trigger guard bit.
    pub guard: RegisterBit,
    /// Guard register value that also counts as active.
    pub guard_value: u16,
    /// External trigger fire register.
    pub fire_register: u16,
    /// External trigger signal bit.
    pub signal: RegisterBit,
    /// External trigger ready bit.
    pub ready: RegisterBit,
    /// Camera trigger flag register.
    pub trigger_flag_register: u16,
    /// Camera result register.
    pub result_register: u16,
    /// Camera barcode layout.
    pub barcode: BarcodeLayout,
    /// Input register consulted when the result register is inconclusive.
    pub input_fallback: Option<u16>,
    /// Result reads per verdict (>= 1).
    pub stabilize_attempts: u32,
    /// Timeouts and delays.
    pub timing: TimingSettings,
}

impl RegisterMap {
    /// Builds a snapshot, normalizing every field.
    pub fn from_options(options: &PlcOptions) -> Self {
        use defaults::*;

        let host = options.ip.trim();
        let endpoint = Endpoint::new(
            if host.is_empty() { IP } else { host },
            in_range(options.port, 1, PORT),
            options.slave_id.clamp(0, i64::from(u8::MAX)) as u8,
        );

        let trigger_addresses = if options.trigger_addresses.is_empty() {
            TRIGGER_ADDRESSES.to_vec()
        } else {
            options.trigger_addresses.clone()
        };

        let qr_length = if options.qr_length <= 0 {
            QR_LENGTH
        } else {
            options.qr_length.min(i64::from(QR_LENGTH_MAX)) as u16
        };

        let input_fallback = options
            .input_fallback
            .then(|| register(options.input_fallback_register, INPUT_FALLBACK_REGISTER));

        let stabilize_attempts = if options.stabilize_attempts <= 0 {
            STABILIZE_ATTEMPTS
        } else {
            options.stabilize_attempts.min(10) as u32
        };

        Self {
            endpoint,
            trigger_addresses,
            pass: RegisterBit::clamped(in_range(options.pass_register, 1, PASS_REGISTER), options.pass_bit),
            fail: RegisterBit::clamped(in_range(options.fail_register, 1, FAIL_REGISTER), options.fail_bit),
            qr: QrSpan {
                register: fit_span(
                    in_range(options.qr_register, 1, QR_REGISTER),
                    qr_length.div_ceil(2),
                ),
                length: qr_length,
            },
            work_order_ready_register: register(options.work_order_ready_register, WORK_ORDER_READY_REGISTER),
            work_order_missing: RegisterBit::clamped(
                register(options.work_order_missing_register, WORK_ORDER_MISSING_REGISTER),
                options.work_order_missing_bit,
            ),
            manual_trigger: RegisterBit::clamped(
                register(options.manual_trigger_register, MANUAL_TRIGGER_REGISTER),
                options.manual_trigger_bit,
            ),
            guard: RegisterBit::clamped(
                register(options.external_trigger_guard_register, GUARD_REGISTER),
                options.external_trigger_guard_bit,
            ),
            guard_value: register(options.external_trigger_guard_value, GUARD_VALUE),
            fire_register: register(options.external_trigger_fire_register, FIRE_REGISTER),
            signal: RegisterBit::clamped(
                register(options.external_trigger_signal_register, SIGNAL_REGISTER),
                options.external_trigger_signal_bit,
            ),
            ready: RegisterBit::clamped(
                register(options.external_trigger_ready_register, READY_REGISTER),
                options.external_trigger_ready_bit,
            ),
            trigger_flag_register: register(options.trigger_flag_register, TRIGGER_FLAG_REGISTER),
            result_register: register(options.result_register, RESULT_REGISTER),
            barcode: barcode_layout(options),
            input_fallback,
            stabilize_attempts,
            timing: normalize_timing(&options.timing),
        }
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::from_options(&PlcOptions::default())
    }
}

impl fmt::Display for RegisterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pass={} fail={} qr=D{}(len={}) ready=D{} missing={} manual={} guard={}=={} fire=D{} signal={} ready_bit={}",
            self.endpoint,
            self.pass,
            self.fail,
            self.qr.register,
            self.qr.length,
            self.work_order_ready_register,
            self.work_order_missing,
            self.manual_trigger,
            self.guard,
            self.guard_value,
            self.fire_register,
            self.signal,
            self.ready,
        )
    }
}

/// `value` if within `min..=u16::MAX`, otherwise `fallback`.
fn in_range(value: i64, min: i64, fallback: u16) -> u16 {
    if (min..=i64::from(u16::MAX)).contains(&value) {
        value as u16
    } else {
        fallback
    }
}

fn register(value: i64, fallback: u16) -> u16 {
    in_range(value, 0, fallback)
}

/// Pulls `start` down so `count` registers from it stay addressable.
fn fit_span(start: u16, count: u16) -> u16 {
    start.min(u16::MAX - count.saturating_sub(1))
}

fn barcode_layout(options: &PlcOptions) -> BarcodeLayout {
    use defaults::*;

    let words_per_char = match options.barcode.words_per_char {
        n @ 1..=4 => n as u16,
        _ => BARCODE_WORDS_PER_CHAR,
    };
    let max_chars = MAX_READ_REGISTERS / words_per_char;
    let chars = match options.barcode.chars {
        n if n >= 1 => n.min(i64::from(max_chars)) as u16,
        _ => BARCODE_CHARS.min(max_chars),
    };

    BarcodeLayout {
        start: fit_span(register(options.barcode.start, BARCODE_START), chars * words_per_char),
        chars,
        words_per_char,
    }
}

fn normalize_timing(timing: &TimingSettings) -> TimingSettings {
    let defaults = TimingSettings::default();
    let or_default = |value: Duration, fallback: Duration| {
        if value.is_zero() {
            fallback
        } else {
            value
        }
    };

    TimingSettings {
        connect_timeout: or_default(timing.connect_timeout, defaults.connect_timeout),
        read_timeout: or_default(timing.read_timeout, defaults.read_timeout),
        write_timeout: or_default(timing.write_timeout, defaults.write_timeout),
        keepalive_time: or_default(timing.keepalive_time, defaults.keepalive_time),
        keepalive_interval: or_default(timing.keepalive_interval, defaults.keepalive_interval),
        probe_timeout: or_default(timing.probe_timeout, defaults.probe_timeout),
        ..timing.clone()
    }
}

// =============================================================================
// SharedRegisterMap
// =============================================================================

/// Result of applying a new configuration.
#[derive(Debug, Clone)]
pub struct MapUpdate {
    /// The snapshot now in effect.
    pub map: Arc<RegisterMap>,
    /// `true` if host or port changed.
    pub endpoint_changed: bool,
}

/// Atomically swapped [`RegisterMap`].
#[derive(Debug)]
pub struct SharedRegisterMap {
    current: ArcSwap<RegisterMap>,
}

impl SharedRegisterMap {
    /// Publishes the normalized form of `options`.
    pub fn new(options: &PlcOptions) -> Self {
        Self {
            current: ArcSwap::from_pointee(RegisterMap::from_options(options)),
        }
    }

    /// Returns the current snapshot.
    #[inline]
    pub fn load(&self) -> Arc<RegisterMap> {
        self.current.load_full()
    }

    /// Normalizes and publishes `options`.
    pub fn apply(&self, options: &PlcOptions) -> MapUpdate {
        let next = Arc::new(RegisterMap::from_options(options));
        let previous = self.current.swap(Arc::clone(&next));
        let endpoint_changed = previous.endpoint.differs_from(&next.endpoint);

        tracing::info!(endpoint_changed, map = %next, "PLC configuration applied");

        MapUpdate {
            map: next,
            endpoint_changed,
        }
    }
}

impl Default for SharedRegisterMap {
    fn default() -> Self {
        Self::new(&PlcOptions::default())
    }
}
