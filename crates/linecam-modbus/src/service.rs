// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Caller-facing operation surface.
//!
//! [`PlcService`] is what a UI, a poll loop or the CLI talks to. It applies
//! one propagation rule throughout: device faults never escape as errors.
//! They are logged (rate-limited) and reported as a negative result such as
//! `false`, `None`, an empty string or [`TriState::Unknown`], so a polling
//! caller simply tries again next cycle. `Err` is reserved for invalid
//! arguments and for calls made after [`PlcService::shutdown`].
//!
//! # Example
//!
//! ```rust,ignore
//! use linecam_modbus::{PlcOptions, PlcService, TriState};
//!
//! let service = PlcService::new(&PlcOptions::default());
//!
//! if service.is_external_trigger_on().await? {
//!     let verdict = service.read_result_status(true).await?;
//!     let code = service.read_plc_qr_string().await?;
//!     println!("{code}: {verdict}");
//!     service.clear_trigger_register().await?;
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::client::{
    Connector, RequestSerializer, RetryPolicy, StatsSnapshot, TcpConnector, TransportManager,
    TransportState, WarnThrottle,
};
use crate::error::{ModbusError, ModbusResult};
use crate::register_map::{MapUpdate, RegisterMap, SharedRegisterMap};
use crate::signals::SignalOperations;
use crate::trigger::TriggerController;
use crate::types::{defaults, PlcOptions, RegisterBit, TriState};

// =============================================================================
// CameraStatus
// =============================================================================

/// Coarse camera connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// No open link to the PLC.
    Disconnected,
    /// Link is open but the result register reads 0.
    NoResponse,
    /// Result register holds a value.
    Online,
    /// The status read failed.
    Error,
}

impl CameraStatus {
    /// Returns `true` only for [`CameraStatus::Online`].
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected: no TCP connection",
            Self::NoResponse => "Disconnected: no camera response",
            Self::Online => "Connected: camera is online",
            Self::Error => "Disconnected: error checking connection",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// PlcService
// =============================================================================

/// The PLC / camera client.
pub struct PlcService {
    serializer: Arc<RequestSerializer>,
    map: Arc<SharedRegisterMap>,
    signals: SignalOperations,
    trigger: TriggerController,
    throttle: WarnThrottle,
    cancelled: AtomicBool,
}

impl PlcService {
    /// Creates a service that dials Modbus/TCP.
    pub fn new(options: &PlcOptions) -> Self {
        Self::with_connector(options, Arc::new(TcpConnector::new()))
    }

    /// Creates a service that opens links through `connector`.
    pub fn with_connector(options: &PlcOptions, connector: Arc<dyn Connector>) -> Self {
        let map = Arc::new(SharedRegisterMap::new(options));
        let snapshot = map.load();

        let manager = TransportManager::new(
            connector,
            snapshot.endpoint.clone(),
            snapshot.timing.clone(),
        );
        let serializer = Arc::new(RequestSerializer::new(manager));

        Self {
            signals: SignalOperations::new(Arc::clone(&serializer), Arc::clone(&map)),
            trigger: TriggerController::new(Arc::clone(&serializer), Arc::clone(&map)),
            throttle: WarnThrottle::new(snapshot.timing.warn_interval),
            serializer,
            map,
            cancelled: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Configuration & lifecycle
    // =========================================================================

    /// Applies a new configuration snapshot. A host or port change drops the
    /// current link; the next operation dials the new endpoint.
    pub fn apply_options(&self, options: &PlcOptions) -> MapUpdate {
        let update = self.map.apply(options);
        self.serializer
            .update(update.map.endpoint.clone(), update.map.timing.clone());
        self.throttle.set_interval(update.map.timing.warn_interval);
        update
    }

    /// Returns the snapshot in effect.
    pub fn register_map(&self) -> Arc<RegisterMap> {
        self.map.load()
    }

    /// Returns link state as last observed.
    pub fn transport_state(&self) -> TransportState {
        self.serializer.state()
    }

    /// Returns serializer counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.serializer.stats()
    }

    /// Refuses further calls and closes the link. Pulses already running
    /// complete their restore write first.
    pub async fn shutdown(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.serializer.close().await;
        tracing::info!("PLC service shut down");
    }

    /// Returns `true` after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> ModbusResult<()> {
        if self.is_shut_down() {
            Err(ModbusError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Turns device faults into `fallback`; argument errors still propagate.
    fn degrade<T>(&self, context: &'static str, result: ModbusResult<T>, fallback: T) -> ModbusResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e @ (ModbusError::Configuration(_) | ModbusError::Cancelled)) => Err(e),
            Err(e) => {
                self.warn(context, &e);
                Ok(fallback)
            }
        }
    }

    fn warn(&self, context: &'static str, error: &ModbusError) {
        if self.throttle.admit() {
            error.log(context);
        } else {
            tracing::debug!(context, error = %error, "Suppressed repeated warning");
        }
    }

    // =========================================================================
    // Triggers & pulses
    // =========================================================================

    /// Fires the camera trigger coil with the configured pulse and gap.
    pub async fn trigger_once(&self) -> ModbusResult<bool> {
        let timing = self.map.load().timing.clone();
        self.trigger_once_with(timing.pulse, timing.trigger_min_gap).await
    }

    /// Fires the camera trigger coil. `false` when debounced, already in
    /// flight, rejected by every candidate or unreachable.
    pub async fn trigger_once_with(&self, pulse: Duration, min_gap: Duration) -> ModbusResult<bool> {
        self.ensure_active()?;
        let outcome = self.trigger.trigger_once(pulse, min_gap).await.map(|o| o.fired());
        self.degrade("trigger", outcome, false)
    }

    /// Pulses the configured manual trigger bit.
    pub async fn pulse_manual_trigger_bit(&self) -> ModbusResult<bool> {
        self.ensure_active()?;
        let map = self.map.load();
        let result = self.signals.pulse_bit(map.manual_trigger, map.timing.pulse).await;
        self.degrade("manual trigger pulse", result.map(|()| true), false)
    }

    /// Pulses an arbitrary register bit with the configured pulse width.
    pub async fn pulse_register_bit(&self, register: u16, bit: u8) -> ModbusResult<bool> {
        let pulse = self.map.load().timing.pulse;
        self.pulse_register_bit_for(register, bit, pulse).await
    }

    /// Pulses an arbitrary register bit. Bit indices above 15 are rejected.
    pub async fn pulse_register_bit_for(&self, register: u16, bit: u8, pulse: Duration) -> ModbusResult<bool> {
        self.ensure_active()?;
        let target = RegisterBit::new(register, bit)?;
        let result = self.signals.pulse_bit(target, pulse).await;
        self.degrade("register bit pulse", result.map(|()| true), false)
    }

    /// Writes `value` to the fire register; with `release_after` the prior
    /// value is restored after `pulse`.
    pub async fn write_external_trigger_fire_register(
        &self,
        value: u16,
        pulse: Duration,
        release_after: bool,
    ) -> ModbusResult<bool> {
        self.ensure_active()?;
        let register = self.map.load().fire_register;
        let result = self
            .signals
            .pulse_register(register, value, None, pulse, release_after)
            .await;
        self.degrade("fire register write", result.map(|()| true), false)
    }

    /// Writes 0, waits, writes 1 to the trigger flag register.
    pub async fn raise_external_trigger(&self) -> ModbusResult<bool> {
        self.ensure_active()?;
        let result = self.trigger.raise_external_trigger().await;
        self.degrade("raise external trigger", result.map(|()| true), false)
    }

    // =========================================================================
    // Result & trigger flag
    // =========================================================================

    /// Determines the inspection verdict.
    ///
    /// The result register is read with stabilization first. An
    /// inconclusive answer falls back to the input register (when enabled)
    /// and finally to the discrete PASS/FAIL bits. With `clear_after`, a
    /// decisive register verdict is cleared once read.
    pub async fn read_result_status(&self, clear_after: bool) -> ModbusResult<TriState> {
        self.ensure_active()?;
        let map = self.map.load();

        match self
            .signals
            .stabilized_result_read(map.result_register, map.stabilize_attempts, map.timing.stabilize_delay)
            .await
        {
            Ok(verdict) if verdict.is_decisive() => {
                if clear_after {
                    self.clear_result_register().await?;
                }
                return Ok(verdict);
            }
            Ok(_) => {}
            Err(e) if e.is_protocol() => {
                tracing::debug!(error = %e, "Result register rejected; falling back");
            }
            Err(e) => self.warn("result register read", &e),
        }

        if let Some(register) = map.input_fallback {
            match self.signals.read_input_register(register).await {
                Ok(raw) => {
                    let verdict = TriState::from_raw(raw);
                    if verdict.is_decisive() && clear_after {
                        self.clear_result_register().await?;
                    }
                    return Ok(verdict);
                }
                Err(e) => self.warn("result input register read", &e),
            }
        }

        let (pass, fail) = self.read_pass_fail_signals().await?;
        Ok(TriState::from_signals(pass, fail))
    }

    /// Writes 0 to the result register. No retry.
    pub async fn clear_result_register(&self) -> ModbusResult<bool> {
        self.ensure_active()?;
        let register = self.map.load().result_register;
        let result = self.signals.write_register(register, 0, RetryPolicy::NoRetry).await;
        self.degrade("result register clear", result.map(|()| true), false)
    }

    /// `true` when the trigger flag register reads exactly 1.
    pub async fn is_external_trigger_on(&self) -> ModbusResult<bool> {
        self.ensure_active()?;
        let register = self.map.load().trigger_flag_register;
        let result = self.signals.read_register(register).await.map(|v| v == 1);
        self.degrade("trigger flag read", result, false)
    }

    /// Writes 0 to the trigger flag register. No retry. Devices that refuse
    /// the write (illegal address or value) are not worth a warning.
    pub async fn clear_trigger_register(&self) -> ModbusResult<bool> {
        self.ensure_active()?;
        let register = self.map.load().trigger_flag_register;
        match self.signals.write_register(register, 0, RetryPolicy::NoRetry).await {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.exception_code(), Some(0x02 | 0x03)) => {
                tracing::debug!(register, error = %e, "Trigger flag clear refused by device");
                Ok(false)
            }
            Err(e) => self.degrade("trigger flag clear", Err(e), false),
        }
    }

    // =========================================================================
    // Work order handshake
    // =========================================================================

    /// Writes 1 or 0 to the work-order ready register.
    pub async fn set_work_order_ready(&self, ready: bool) -> ModbusResult<bool> {
        self.ensure_active()?;
        let register = self.map.load().work_order_ready_register;
        let result = self
            .signals
            .write_register(register, u16::from(ready), RetryPolicy::RetryOnce)
            .await;
        if result.is_ok() {
            tracing::info!(register, ready, "Work-order ready flag written");
        }
        self.degrade("work-order ready write", result.map(|()| true), false)
    }

    /// `Some(true)` when the ready register is non-zero; `None` if unreachable.
    pub async fn read_work_order_ready(&self) -> ModbusResult<Option<bool>> {
        self.ensure_active()?;
        let register = self.map.load().work_order_ready_register;
        let result = self.signals.read_register(register).await.map(|v| Some(v != 0));
        self.degrade("work-order ready read", result, None)
    }

    /// Work-order missing bit; `None` if unreachable.
    pub async fn read_work_order_missing_flag(&self) -> ModbusResult<Option<bool>> {
        self.read_flag("work-order missing read", self.map.load().work_order_missing)
            .await
    }

    // =========================================================================
    // External trigger handshake
    // =========================================================================

    /// Raw guard register value; `None` if unreachable.
    pub async fn read_external_trigger_guard_register(&self) -> ModbusResult<Option<u16>> {
        self.ensure_active()?;
        let register = self.map.load().guard.register();
        let result = self.signals.read_register(register).await.map(Some);
        self.degrade("guard register read", result, None)
    }

    /// Guard is active when the register equals the configured value or the
    /// configured bit is set.
    pub async fn is_external_trigger_guard_active(&self) -> ModbusResult<bool> {
        let map = self.map.load();
        Ok(match self.read_external_trigger_guard_register().await? {
            Some(value) => value == map.guard_value || map.guard.is_set(value),
            None => false,
        })
    }

    /// External trigger request bit; `None` if unreachable.
    pub async fn read_external_trigger_signal(&self) -> ModbusResult<Option<bool>> {
        self.read_flag("trigger signal read", self.map.load().signal).await
    }

    /// Camera ready bit; `None` if unreachable.
    pub async fn read_external_trigger_ready_bit(&self) -> ModbusResult<Option<bool>> {
        self.read_flag("trigger ready read", self.map.load().ready).await
    }

    async fn read_flag(&self, context: &'static str, bit: RegisterBit) -> ModbusResult<Option<bool>> {
        self.ensure_active()?;
        let result = self.signals.read_bit(bit).await.map(Some);
        self.degrade(context, result, None)
    }

    // =========================================================================
    // Signals & text
    // =========================================================================

    /// PASS and FAIL bits from one read; `(false, false)` if unreachable.
    pub async fn read_pass_fail_signals(&self) -> ModbusResult<(bool, bool)> {
        self.ensure_active()?;
        let result = self.signals.read_pass_fail_signals().await;
        self.degrade("pass/fail read", result, (false, false))
    }

    /// QR text from the PLC; empty if unreachable.
    pub async fn read_plc_qr_string(&self) -> ModbusResult<String> {
        self.ensure_active()?;
        let result = self.signals.read_qr_string().await.map(|d| d.into_text());
        self.degrade("QR read", result, String::new())
    }

    /// Camera barcode at an explicit location; empty if unreachable.
    /// Zero-length or oversized layouts are argument errors.
    pub async fn read_camera_barcode(&self, start: u16, chars: u16, words_per_char: u16) -> ModbusResult<String> {
        self.ensure_active()?;
        let settle = self.map.load().timing.barcode_settle;
        let result = self
            .signals
            .read_camera_barcode(start, chars, words_per_char, settle)
            .await;
        self.degrade("barcode read", result, String::new())
    }

    /// Camera barcode at the configured location.
    pub async fn read_default_camera_barcode(&self) -> ModbusResult<String> {
        let layout = self.map.load().barcode;
        self.read_camera_barcode(layout.start, layout.chars, layout.words_per_char)
            .await
    }

    /// Raw holding register read. Unlike the rest of the surface, device
    /// faults propagate so diagnostics can show them.
    pub async fn read_holding_registers(&self, start: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.ensure_active()?;
        if count == 0 || count > defaults::MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_argument(
                "count",
                format!("must be 1-{}", defaults::MAX_READ_REGISTERS),
            ));
        }
        self.signals.read_holding(start, count).await
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Probes the PLC port. A failed probe drops the link. Unless
    /// `tcp_only`, the result register is read too; an illegal-address or
    /// device-failure exception still proves the device is there.
    pub async fn check_connection(&self, tcp_only: bool) -> ModbusResult<bool> {
        self.ensure_active()?;
        let manager = self.serializer.manager();

        if !manager.probe().await {
            manager.invalidate();
            return Ok(false);
        }
        if tcp_only {
            return Ok(true);
        }

        let register = self.map.load().result_register;
        Ok(match self.signals.read_register(register).await {
            Ok(_) => true,
            Err(e) if matches!(e.exception_code(), Some(0x02 | 0x04)) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Connection check read failed");
                false
            }
        })
    }

    /// Coarse camera connectivity from the result register.
    pub async fn camera_status(&self) -> ModbusResult<CameraStatus> {
        self.ensure_active()?;
        if !self.serializer.state().is_connected() {
            return Ok(CameraStatus::Disconnected);
        }

        let register = self.map.load().result_register;
        Ok(match self.signals.read_register(register).await {
            Ok(0) => CameraStatus::NoResponse,
            Ok(_) => CameraStatus::Online,
            Err(e) => {
                self.warn("camera status", &e);
                CameraStatus::Error
            }
        })
    }
}

impl fmt::Debug for PlcService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlcService")
            .field("serializer", &self.serializer)
            .field("cancelled", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_status_display() {
        assert_eq!(CameraStatus::Online.to_string(), "Connected: camera is online");
        assert!(CameraStatus::Online.is_online());
        assert!(!CameraStatus::NoResponse.is_online());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_upfront() {
        let service = PlcService::new(&PlcOptions {
            ip: "127.0.0.1".into(),
            port: 1,
            ..PlcOptions::default()
        });
        service.shutdown().await;
        assert!(service.is_shut_down());
        assert!(matches!(service.trigger_once().await, Err(ModbusError::Cancelled)));
        assert!(matches!(service.read_plc_qr_string().await, Err(ModbusError::Cancelled)));
        assert!(matches!(service.check_connection(true).await, Err(ModbusError::Cancelled)));
    }

    #[tokio::test]
    async fn test_invalid_bit_is_argument_error() {
        let service = PlcService::new(&PlcOptions::default());
        let err = service.pulse_register_bit(2001, 16).await.unwrap_err();
        assert!(matches!(err, ModbusError::Configuration(_)));
        assert_eq!(service.stats().connects, 0);
    }

    #[tokio::test]
    async fn test_raw_read_rejects_bad_count() {
        let service = PlcService::new(&PlcOptions::default());
        assert!(service.read_holding_registers(0, 0).await.is_err());
        assert!(service.read_holding_registers(0, 126).await.is_err());
    }
}
