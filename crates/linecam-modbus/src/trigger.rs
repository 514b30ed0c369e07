// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Debounced one-shot camera trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::client::{RequestSerializer, RetryPolicy};
use crate::error::ModbusResult;
use crate::register_map::SharedRegisterMap;

/// Why a trigger was refused without touching the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRejection {
    /// Called inside the minimum gap after the last success.
    Cooldown,
    /// Another trigger is still running.
    InFlight,
}

/// Outcome of [`TriggerController::trigger_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The coil at this address was pulsed.
    Fired(u16),
    /// Every candidate rejected the write.
    NoCandidate,
    /// Refused before any device access.
    Rejected(TriggerRejection),
}

impl TriggerOutcome {
    /// Returns `true` if a coil was pulsed.
    pub fn fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Coil trigger with a cooldown and a reentrancy guard.
#[derive(Debug)]
pub struct TriggerController {
    serializer: Arc<RequestSerializer>,
    map: Arc<SharedRegisterMap>,
    cooldown_until: Arc<Mutex<Option<Instant>>>,
    in_flight: Arc<AtomicBool>,
}

impl TriggerController {
    /// Creates a controller.
    pub fn new(serializer: Arc<RequestSerializer>, map: Arc<SharedRegisterMap>) -> Self {
        Self {
            serializer,
            map,
            cooldown_until: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while a trigger is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Takes the in-flight flag, then checks the cooldown while holding it.
    /// The cooldown is only written by the flag holder.
    fn admit(&self) -> Result<InFlightGuard, TriggerRejection> {
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(TriggerRejection::InFlight)?;
        if matches!(*self.cooldown_until.lock(), Some(until) if Instant::now() < until) {
            return Err(TriggerRejection::Cooldown);
        }
        Ok(guard)
    }

    /// Pulses the first candidate coil that accepts the write.
    ///
    /// Refused with no device access during the cooldown or while another
    /// trigger runs. Candidates are tried in order inside one critical
    /// section; an exception response moves on to the next address. The
    /// first success starts a cooldown of `min_gap`.
    pub async fn trigger_once(&self, pulse: Duration, min_gap: Duration) -> ModbusResult<TriggerOutcome> {
        let guard = match self.admit() {
            Ok(guard) => guard,
            Err(rejection) => {
                tracing::debug!(?rejection, "Trigger blocked");
                return Ok(TriggerOutcome::Rejected(rejection));
            }
        };

        let candidates = self.map.load().trigger_addresses.clone();
        let cooldown = Arc::clone(&self.cooldown_until);

        // The guard moves into the task so the flag stays set until the
        // pulse sequence has finished, even if this future is dropped.
        self.serializer
            .execute_detached(RetryPolicy::NoRetry, move |t| {
                let _held = &guard;
                let candidates = candidates.clone();
                let cooldown = Arc::clone(&cooldown);
                Box::pin(async move {
                    for address in candidates {
                        match pulse_coil(t, address, pulse).await {
                            Ok(()) => {
                                *cooldown.lock() = Some(Instant::now() + min_gap);
                                tracing::info!(address, "Trigger fired");
                                return Ok(TriggerOutcome::Fired(address));
                            }
                            Err(e) if e.is_protocol() => {
                                tracing::debug!(
                                    address,
                                    error = %e,
                                    "Trigger coil rejected; trying next candidate"
                                );
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(TriggerOutcome::NoCandidate)
                })
            })
            .await
    }

    /// Writes 0 then 1 to the trigger flag register inside one critical
    /// section, so the camera always sees a clean rising edge.
    pub async fn raise_external_trigger(&self) -> ModbusResult<()> {
        let map = self.map.load();
        let register = map.trigger_flag_register;
        let delay = map.timing.raise_delay;

        self.serializer
            .execute_detached(RetryPolicy::NoRetry, move |t| {
                Box::pin(async move {
                    t.write_single_register(register, 0).await?;
                    tokio::time::sleep(delay).await;
                    t.write_single_register(register, 1).await
                })
            })
            .await?;

        tracing::info!(register, "External trigger raised 0 -> 1");
        Ok(())
    }
}

async fn pulse_coil(
    t: &mut dyn crate::client::ModbusTransport,
    address: u16,
    pulse: Duration,
) -> ModbusResult<()> {
    t.write_single_coil(address, true).await?;
    tokio::time::sleep(pulse).await;
    t.write_single_coil(address, false).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_clears_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert!(flag.load(Ordering::Acquire));
        assert!(InFlightGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_checked_after_taking_flag() {
        let serializer = Arc::new(RequestSerializer::new(crate::client::TransportManager::new(
            Arc::new(crate::client::TcpConnector::new()),
            Default::default(),
            Default::default(),
        )));
        let controller = TriggerController::new(serializer, Arc::new(SharedRegisterMap::default()));

        *controller.cooldown_until.lock() = Some(Instant::now() + Duration::from_secs(1));
        assert!(matches!(controller.admit(), Err(TriggerRejection::Cooldown)));
        assert!(!controller.is_in_flight());

        let held = InFlightGuard::acquire(&controller.in_flight).unwrap();
        assert!(matches!(controller.admit(), Err(TriggerRejection::InFlight)));
        drop(held);

        tokio::time::advance(Duration::from_secs(1)).await;
        let guard = controller.admit().unwrap();
        assert!(controller.is_in_flight());
        drop(guard);
        assert!(!controller.is_in_flight());
    }

    #[test]
    fn test_outcome_fired() {
        assert!(TriggerOutcome::Fired(1).fired());
        assert!(!TriggerOutcome::NoCandidate.fired());
        assert!(!TriggerOutcome::Rejected(TriggerRejection::Cooldown).fired());
    }
}
