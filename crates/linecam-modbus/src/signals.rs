// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Domain-level signal operations built on raw register access.
//!
//! Every method here propagates device faults as [`ModbusError`]s. Turning
//! them into negative results is [`PlcService`](crate::service::PlcService)'s
//! job.
//!
//! Pulses run through [`RequestSerializer::execute_detached`] with
//! [`RetryPolicy::NoRetry`]: once a pulse starts, its restore write happens
//! even if the caller stops waiting, and a transport fault never causes the
//! actuator to fire a second time.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{RequestSerializer, RetryPolicy};
use crate::codec::{self, DecodedText};
use crate::error::{ModbusError, ModbusResult};
use crate::register_map::SharedRegisterMap;
use crate::types::{defaults, RegisterBit, TriState};

// =============================================================================
// SignalOperations
// =============================================================================

/// Pulses, stabilized reads and text reads.
#[derive(Debug, Clone)]
pub struct SignalOperations {
    serializer: Arc<RequestSerializer>,
    map: Arc<SharedRegisterMap>,
}

impl SignalOperations {
    /// Creates the operations over a shared serializer and map.
    pub fn new(serializer: Arc<RequestSerializer>, map: Arc<SharedRegisterMap>) -> Self {
        Self { serializer, map }
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    /// Reads `count` holding registers with retry-once.
    pub async fn read_holding(&self, start: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.serializer
            .execute(RetryPolicy::RetryOnce, move |t| {
                Box::pin(async move { t.read_holding_registers(start, count).await })
            })
            .await
    }

    /// Reads one holding register with retry-once.
    pub async fn read_register(&self, register: u16) -> ModbusResult<u16> {
        first_word(self.read_holding(register, 1).await?, register)
    }

    /// Reads one input register with retry-once.
    pub async fn read_input_register(&self, register: u16) -> ModbusResult<u16> {
        let words = self
            .serializer
            .execute(RetryPolicy::RetryOnce, move |t| {
                Box::pin(async move { t.read_input_registers(register, 1).await })
            })
            .await?;
        first_word(words, register)
    }

    /// Writes one holding register.
    pub async fn write_register(&self, register: u16, value: u16, policy: RetryPolicy) -> ModbusResult<()> {
        self.serializer
            .execute(policy, move |t| {
                Box::pin(async move { t.write_single_register(register, value).await })
            })
            .await
    }

    /// Reads one register and tests a bit.
    pub async fn read_bit(&self, bit: RegisterBit) -> ModbusResult<bool> {
        Ok(bit.is_set(self.read_register(bit.register()).await?))
    }

    // =========================================================================
    // Pulses
    // =========================================================================

    /// Sets `bit` for `duration`, then writes back the register's original
    /// value. A failed read aborts before anything is written.
    pub async fn pulse_bit(&self, bit: RegisterBit, duration: Duration) -> ModbusResult<()> {
        let register = bit.register();
        let mask = bit.mask();

        self.serializer
            .execute_detached(RetryPolicy::NoRetry, move |t| {
                Box::pin(async move {
                    let original = first_word(t.read_holding_registers(register, 1).await?, register)?;
                    t.write_single_register(register, original | mask).await?;
                    tokio::time::sleep(duration).await;
                    t.write_single_register(register, original).await
                })
            })
            .await?;

        tracing::info!(register, bit = bit.bit(), ?duration, "Register bit pulsed");
        Ok(())
    }

    /// Writes `on` to `register` and, when `release_after` is set, restores it
    /// after `duration`. The restore value is `off`, or the register's prior
    /// value when `off` is `None`.
    pub async fn pulse_register(
        &self,
        register: u16,
        on: u16,
        off: Option<u16>,
        duration: Duration,
        release_after: bool,
    ) -> ModbusResult<()> {
        self.serializer
            .execute_detached(RetryPolicy::NoRetry, move |t| {
                Box::pin(async move {
                    let restore = match (release_after, off) {
                        (false, _) => None,
                        (true, Some(off)) => Some(off),
                        (true, None) => {
                            Some(first_word(t.read_holding_registers(register, 1).await?, register)?)
                        }
                    };

                    t.write_single_register(register, on).await?;

                    if let Some(restore) = restore {
                        tokio::time::sleep(duration).await;
                        t.write_single_register(register, restore).await?;
                    }
                    Ok(())
                })
            })
            .await?;

        tracing::info!(register, value = on, release_after, "Register pulsed");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads a tri-state register, re-reading before committing a verdict.
    ///
    /// With `attempts <= 1` a single read decides. Otherwise a decisive first
    /// read must be confirmed by a second one, and an inconclusive first
    /// read gets one more chance.
    pub async fn stabilized_result_read(
        &self,
        register: u16,
        attempts: u32,
        delay: Duration,
    ) -> ModbusResult<TriState> {
        let first = TriState::from_raw(self.read_register(register).await?);
        if attempts <= 1 {
            return Ok(first);
        }

        tokio::time::sleep(delay).await;
        let second = TriState::from_raw(self.read_register(register).await?);

        let verdict = match (first.is_decisive(), second) {
            (true, second) if second == first => first,
            (true, _) => TriState::Unknown,
            (false, second) => second,
        };

        tracing::trace!(register, %first, %second, %verdict, "Stabilized result read");
        Ok(verdict)
    }

    /// Reads the PASS and FAIL bits.
    ///
    /// Registers close enough to share one request are read together;
    /// otherwise each is read on its own inside the same critical section.
    pub async fn read_pass_fail_signals(&self) -> ModbusResult<(bool, bool)> {
        let map = self.map.load();
        let (pass, fail) = (map.pass, map.fail);
        let start = pass.register().min(fail.register());
        let end = pass.register().max(fail.register());
        let count = end - start + 1;

        if count <= defaults::MAX_READ_REGISTERS {
            let words = self.read_holding(start, count).await?;
            let bit_at = |bit: RegisterBit| {
                words
                    .get(usize::from(bit.register() - start))
                    .map(|&word| bit.is_set(word))
                    .unwrap_or(false)
            };
            return Ok((bit_at(pass), bit_at(fail)));
        }

        let (pass_word, fail_word) = self
            .serializer
            .execute(RetryPolicy::RetryOnce, move |t| {
                Box::pin(async move {
                    let pass_word =
                        first_word(t.read_holding_registers(pass.register(), 1).await?, pass.register())?;
                    let fail_word =
                        first_word(t.read_holding_registers(fail.register(), 1).await?, fail.register())?;
                    Ok((pass_word, fail_word))
                })
            })
            .await?;

        Ok((pass.is_set(pass_word), fail.is_set(fail_word)))
    }

    /// Reads and decodes the PLC QR text.
    pub async fn read_qr_string(&self) -> ModbusResult<DecodedText> {
        let qr = self.map.load().qr;
        let words = self.read_holding(qr.register, qr.register_count()).await?;
        let decoded = codec::decode_words(&words, usize::from(qr.length));

        tracing::debug!(
            register = qr.register,
            chosen = %decoded.chosen,
            high_first = %decoded.high_first,
            low_first = %decoded.low_first,
            "QR text decoded"
        );
        Ok(decoded)
    }

    /// Waits `settle`, then reads and decodes a camera barcode.
    pub async fn read_camera_barcode(
        &self,
        start: u16,
        chars: u16,
        words_per_char: u16,
        settle: Duration,
    ) -> ModbusResult<String> {
        if chars == 0 {
            return Err(ModbusError::invalid_argument("chars", "must be at least 1"));
        }
        if words_per_char == 0 {
            return Err(ModbusError::invalid_argument("words_per_char", "must be at least 1"));
        }
        let total = u32::from(chars) * u32::from(words_per_char);
        if total > u32::from(defaults::MAX_READ_REGISTERS) {
            return Err(ModbusError::invalid_argument(
                "chars",
                format!("{total} registers exceed a single read"),
            ));
        }
        if u32::from(start) + total > u32::from(u16::MAX) + 1 {
            return Err(ModbusError::invalid_argument("start", "range runs past register 65535"));
        }

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let words = self.read_holding(start, total as u16).await?;
        Ok(codec::decode_barcode(&words, usize::from(words_per_char)))
    }
}

fn first_word(words: Vec<u16>, register: u16) -> ModbusResult<u16> {
    words.first().copied().ok_or_else(|| {
        ModbusError::connection(crate::error::ConnectionError::Framing {
            message: format!("empty response reading register {register}"),
        })
    })
}
