// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection ownership.
//!
//! [`ConnectionState`] is the only place a live link is stored, and it lives
//! inside the serializer's bus mutex, so the link can only be reached with
//! the bus lock held. [`TransportManager`] opens, validates and closes it;
//! every method that touches a link takes `&mut ConnectionState`, so
//! connection establishment is serialized by the bus lock alone.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::ModbusResult;
use crate::types::{Endpoint, TimingSettings};

use super::transport::{Connector, ModbusTransport, TransportState};

// =============================================================================
// ConnectionState
// =============================================================================

/// The live link, if any. Replaced wholesale on reconnect.
#[derive(Default)]
pub struct ConnectionState {
    link: Option<Link>,
}

struct Link {
    transport: Box<dyn ModbusTransport>,
    endpoint: Endpoint,
    /// Read and write timeouts last pushed to the transport.
    timeouts: (Duration, Duration),
    generation: u64,
}

impl ConnectionState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a link is stored.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Returns the stored link.
    pub(crate) fn transport_mut(&mut self) -> Option<&mut (dyn ModbusTransport + 'static)> {
        self.link.as_mut().map(|link| link.transport.as_mut())
    }
}

// =============================================================================
// TransportManager
// =============================================================================

/// Owns connection establishment for the single PLC link.
pub struct TransportManager {
    connector: Arc<dyn Connector>,
    endpoint: ArcSwap<Endpoint>,
    timing: ArcSwap<TimingSettings>,
    /// Bumped whenever the current link must not be reused.
    generation: AtomicU64,
    state: AtomicU8,
    connects: AtomicU64,
}

impl TransportManager {
    /// Creates a manager that dials through `connector`.
    pub fn new(connector: Arc<dyn Connector>, endpoint: Endpoint, timing: TimingSettings) -> Self {
        Self {
            connector,
            endpoint: ArcSwap::from_pointee(endpoint),
            timing: ArcSwap::from_pointee(timing),
            generation: AtomicU64::new(0),
            state: AtomicU8::new(TransportState::Disconnected.to_u8()),
            connects: AtomicU64::new(0),
        }
    }

    /// Returns the current endpoint.
    pub fn endpoint(&self) -> Arc<Endpoint> {
        self.endpoint.load_full()
    }

    /// Returns the current timing settings.
    pub fn timing(&self) -> Arc<TimingSettings> {
        self.timing.load_full()
    }

    /// Returns the state as last observed.
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of links opened so far.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Stores new settings. Returns `true` and invalidates the link when host
    /// or port changed.
    pub fn update(&self, endpoint: Endpoint, timing: TimingSettings) -> bool {
        let current = Arc::new(endpoint);
        let previous = self.endpoint.swap(Arc::clone(&current));
        self.timing.store(Arc::new(timing));

        let changed = previous.differs_from(&current);
        if changed {
            tracing::info!(
                from = %previous,
                to = %current,
                "PLC endpoint changed; connection will be reopened"
            );
            self.invalidate();
        }
        changed
    }

    /// Marks the current link stale; the next [`ensure_connected`](Self::ensure_connected)
    /// closes it and dials again.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn is_current(&self, state: &ConnectionState) -> bool {
        match &state.link {
            Some(link) => {
                link.generation == self.generation.load(Ordering::Acquire)
                    && link.transport.is_healthy()
            }
            None => false,
        }
    }

    /// Makes sure `state` holds a healthy link for the current endpoint.
    pub async fn ensure_connected(&self, state: &mut ConnectionState) -> ModbusResult<()> {
        if self.is_current(state) {
            self.sync_settings(state);
            return Ok(());
        }

        self.close(state).await;

        let generation = self.generation.load(Ordering::Acquire);
        let endpoint = self.endpoint.load_full();
        let timing = self.timing.load_full();

        self.set_state(TransportState::Connecting);
        match self.connector.connect(&endpoint, &timing).await {
            Ok(transport) => {
                self.connects.fetch_add(1, Ordering::Relaxed);
                state.link = Some(Link {
                    transport,
                    endpoint: Endpoint::clone(&endpoint),
                    timeouts: (timing.read_timeout, timing.write_timeout),
                    generation,
                });
                self.set_state(TransportState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(TransportState::Disconnected);
                Err(e)
            }
        }
    }

    /// Station id and timeout changes apply without reconnecting.
    fn sync_settings(&self, state: &mut ConnectionState) {
        let Some(link) = state.link.as_mut() else {
            return;
        };

        let slave_id = self.endpoint.load().slave_id;
        if link.endpoint.slave_id != slave_id {
            link.transport.set_slave(slave_id);
            link.endpoint.slave_id = slave_id;
        }

        let timing = self.timing.load();
        let timeouts = (timing.read_timeout, timing.write_timeout);
        if link.timeouts != timeouts {
            link.transport.set_timeouts(timeouts.0, timeouts.1);
            link.timeouts = timeouts;
        }
    }

    /// Disconnects and drops the link. Idempotent; disconnect errors are
    /// logged and swallowed.
    pub async fn close(&self, state: &mut ConnectionState) {
        if let Some(mut link) = state.link.take() {
            if let Err(e) = link.transport.disconnect().await {
                tracing::debug!(peer = %link.transport.peer(), error = %e, "Ignoring disconnect error");
            }
        }
        self.set_state(TransportState::Disconnected);
    }

    /// Probes the current endpoint with a throwaway socket.
    pub async fn probe(&self) -> bool {
        let endpoint = self.endpoint.load_full();
        let limit = self.timing.load().probe_timeout;
        self.connector.probe(&endpoint, limit).await
    }

    fn set_state(&self, state: TransportState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("endpoint", &self.endpoint.load_full())
            .field("state", &self.state())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
