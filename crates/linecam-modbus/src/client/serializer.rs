// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The bus lock.
//!
//! Modbus/TCP responses carry no correlation id the client could trust
//! across interleaved callers, so every device operation runs inside one
//! critical section: [`RequestSerializer::execute`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{ModbusError, ModbusResult};
use crate::types::{Endpoint, TimingSettings};

use super::manager::{ConnectionState, TransportManager};
use super::retry::{RetryPolicy, WarnThrottle};
use super::transport::{ModbusTransport, TransportState};

/// Boxed future returned by a device operation.
pub type OpFuture<'a, T> = Pin<Box<dyn Future<Output = ModbusResult<T>> + Send + 'a>>;

// =============================================================================
// RequestSerializer
// =============================================================================

/// Runs device operations one at a time over the shared link.
pub struct RequestSerializer {
    bus: Mutex<ConnectionState>,
    manager: TransportManager,
    throttle: WarnThrottle,
    consecutive_failures: AtomicU32,
    stats: SerializerStats,
}

impl RequestSerializer {
    /// Creates a serializer around `manager`.
    pub fn new(manager: TransportManager) -> Self {
        let warn_interval = manager.timing().warn_interval;
        Self {
            bus: Mutex::new(ConnectionState::new()),
            manager,
            throttle: WarnThrottle::new(warn_interval),
            consecutive_failures: AtomicU32::new(0),
            stats: SerializerStats::default(),
        }
    }

    /// Returns the transport manager.
    pub fn manager(&self) -> &TransportManager {
        &self.manager
    }

    /// Stores new endpoint and timing settings. Returns `true` when host or
    /// port changed and the link will be reopened.
    pub fn update(&self, endpoint: Endpoint, timing: TimingSettings) -> bool {
        self.throttle.set_interval(timing.warn_interval);
        self.manager.update(endpoint, timing)
    }

    /// Returns the link state as last observed.
    pub fn state(&self) -> TransportState {
        self.manager.state()
    }

    /// Transport faults since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Runs `op` against the link under the bus lock.
    ///
    /// A transport fault closes the link; with [`RetryPolicy::RetryOnce`]
    /// the link is reopened and `op` runs exactly once more. Protocol faults
    /// propagate at once and leave the link open.
    pub async fn execute<T, F>(&self, policy: RetryPolicy, mut op: F) -> ModbusResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn ModbusTransport) -> OpFuture<'t, T> + Send,
        T: Send,
    {
        let mut state = self.bus.lock().await;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.run_once(&mut state, &mut op).await {
                Ok(value) => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) if e.is_transport() => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    self.stats.transport_faults.fetch_add(1, Ordering::Relaxed);
                    if self.throttle.admit() {
                        tracing::warn!(
                            failures,
                            policy = %policy,
                            error = %e,
                            "Transport fault; closing connection"
                        );
                    }
                    self.manager.close(&mut state).await;

                    if !policy.allows_retry(attempt) {
                        return Err(e);
                    }
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    if e.is_protocol() {
                        self.stats.protocol_faults.fetch_add(1, Ordering::Relaxed);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn run_once<T, F>(&self, state: &mut ConnectionState, op: &mut F) -> ModbusResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn ModbusTransport) -> OpFuture<'t, T> + Send,
        T: Send,
    {
        self.manager.ensure_connected(state).await?;
        let transport = state.transport_mut().ok_or_else(ModbusError::not_connected)?;
        op(transport).await
    }

    /// Like [`execute`](Self::execute), but on a spawned task. Dropping the
    /// returned future does not interrupt the operation, so a pulse always
    /// reaches its restore write.
    pub async fn execute_detached<T, F>(self: &Arc<Self>, policy: RetryPolicy, op: F) -> ModbusResult<T>
    where
        F: for<'t> FnMut(&'t mut dyn ModbusTransport) -> OpFuture<'t, T> + Send + 'static,
        T: Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.execute(policy, op).await })
            .await
            .map_err(|e| ModbusError::Task {
                message: e.to_string(),
            })?
    }

    /// Closes the link under the bus lock.
    pub async fn close(&self) {
        let mut state = self.bus.lock().await;
        self.manager.close(&mut state).await;
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            connects: self.manager.connects(),
            successes: self.stats.successes.load(Ordering::Relaxed),
            transport_faults: self.stats.transport_faults.load(Ordering::Relaxed),
            protocol_faults: self.stats.protocol_faults.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

impl std::fmt::Debug for RequestSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSerializer")
            .field("manager", &self.manager)
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct SerializerStats {
    successes: AtomicU64,
    transport_faults: AtomicU64,
    protocol_faults: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of the serializer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Links opened.
    pub connects: u64,
    /// Operations that completed.
    pub successes: u64,
    /// Transport faults seen, retried or not.
    pub transport_faults: u64,
    /// Exception responses.
    pub protocol_faults: u64,
    /// Retries performed.
    pub retries: u64,
    /// Transport faults since the last success.
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::Connector;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Link whose reads pop scripted outcomes.
    struct ScriptedLink {
        script: Arc<parking_lot::Mutex<VecDeque<ModbusResult<u16>>>>,
    }

    #[async_trait]
    impl ModbusTransport for ScriptedLink {
        async fn read_holding_registers(&mut self, _address: u16, _count: u16) -> ModbusResult<Vec<u16>> {
            let next = self.script.lock().pop_front().unwrap_or(Ok(0));
            next.map(|v| vec![v])
        }
        async fn read_input_registers(&mut self, a: u16, c: u16) -> ModbusResult<Vec<u16>> {
            self.read_holding_registers(a, c).await
        }
        async fn write_single_register(&mut self, _a: u16, _v: u16) -> ModbusResult<()> {
            Ok(())
        }
        async fn write_single_coil(&mut self, _a: u16, _v: bool) -> ModbusResult<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> ModbusResult<()> {
            Ok(())
        }
        fn set_slave(&mut self, _slave_id: u8) {}
        fn peer(&self) -> String {
            "scripted".into()
        }
    }

    struct ScriptedConnector {
        script: Arc<parking_lot::Mutex<VecDeque<ModbusResult<u16>>>>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _e: &Endpoint, _t: &TimingSettings) -> ModbusResult<Box<dyn ModbusTransport>> {
            Ok(Box::new(ScriptedLink {
                script: Arc::clone(&self.script),
            }))
        }
        async fn probe(&self, _e: &Endpoint, _l: Duration) -> bool {
            true
        }
    }

    fn serializer(script: Vec<ModbusResult<u16>>) -> RequestSerializer {
        let connector = Arc::new(ScriptedConnector {
            script: Arc::new(parking_lot::Mutex::new(script.into())),
        });
        RequestSerializer::new(TransportManager::new(
            connector,
            Endpoint::default(),
            TimingSettings::default(),
        ))
    }

    fn read_one(t: &mut dyn ModbusTransport) -> OpFuture<'_, u16> {
        Box::pin(async move { Ok(t.read_holding_registers(0, 1).await?[0]) })
    }

    #[tokio::test]
    async fn test_retry_once_after_transport_fault() {
        let s = serializer(vec![Err(ModbusError::not_connected()), Ok(7)]);
        assert_eq!(s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap(), 7);

        let stats = s.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_second_fault_propagates() {
        let s = serializer(vec![
            Err(ModbusError::not_connected()),
            Err(ModbusError::not_connected()),
            Ok(1),
        ]);
        let err = s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(s.stats().retries, 1);
        assert_eq!(s.consecutive_failures(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_propagates_first_fault() {
        let s = serializer(vec![Err(ModbusError::not_connected()), Ok(1)]);
        assert!(s.execute(RetryPolicy::NoRetry, read_one).await.is_err());
        assert_eq!(s.stats().retries, 0);
        assert_eq!(s.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn test_protocol_fault_keeps_link() {
        let s = serializer(vec![Err(ModbusError::exception(0x03, 0x02)), Ok(5)]);
        let err = s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap_err();
        assert_eq!(err.exception_code(), Some(0x02));
        assert_eq!(s.state(), TransportState::Connected);

        assert_eq!(s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap(), 5);
        assert_eq!(s.stats().connects, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let s = serializer(vec![Ok(1), Ok(2)]);
        s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap();
        s.manager().invalidate();
        s.execute(RetryPolicy::RetryOnce, read_one).await.unwrap();
        assert_eq!(s.stats().connects, 2);
    }

    #[tokio::test]
    async fn test_update_retunes_warn_throttle() {
        let s = serializer(vec![]);
        let timing = TimingSettings {
            warn_interval: Duration::from_millis(300),
            ..TimingSettings::default()
        };
        assert!(!s.update(Endpoint::default(), timing));
        assert_eq!(s.throttle.interval(), Duration::from_millis(300));
        assert_eq!(s.manager().timing().warn_interval, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_execute_detached() {
        let s = Arc::new(serializer(vec![Ok(9)]));
        assert_eq!(s.execute_detached(RetryPolicy::NoRetry, read_one).await.unwrap(), 9);
    }
}
