// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polling runtime behind the `watch` command.
//!
//! Each cycle:
//!
//! - checks connectivity every `connection_check_interval`
//! - reloads the config file when it changed, re-pointing the client
//! - on a rising edge of the trigger flag, reads the verdict, the QR text
//!   and the work-order flag, then clears the trigger flag
//!
//! Device faults never stop the loop; the client reports them as negative
//! results and the next cycle tries again.

use std::sync::Arc;

use linecam_config::{ConfigWatcher, PollSettings};
use linecam_modbus::{PlcService, TriState};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BinResult;
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Reports
// =============================================================================

/// Totals reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchSummary {
    /// Inspection cycles handled.
    pub cycles: u64,
    /// Cycles with a PASS verdict.
    pub passes: u64,
    /// Cycles with a FAIL verdict.
    pub fails: u64,
    /// Cycles without a verdict.
    pub unknowns: u64,
    /// Successful config reloads.
    pub reloads: u64,
}

impl WatchSummary {
    fn record(&mut self, verdict: TriState) {
        self.cycles += 1;
        match verdict {
            TriState::Pass => self.passes += 1,
            TriState::Fail => self.fails += 1,
            TriState::Unknown => self.unknowns += 1,
        }
    }
}

/// One handled trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionCycle {
    /// Verdict read from the camera.
    pub verdict: TriState,
    /// PLC QR text, when enabled.
    pub qr: Option<String>,
    /// Work-order missing flag.
    pub work_order_missing: Option<bool>,
}

#[derive(Debug, Default)]
struct LoopState {
    trigger_high: bool,
    connected: Option<bool>,
    last_check: Option<Instant>,
    last_reload: Option<Instant>,
    summary: WatchSummary,
}

// =============================================================================
// WatchRuntime
// =============================================================================

/// The `watch` polling loop.
pub struct WatchRuntime {
    service: Arc<PlcService>,
    poll: PollSettings,
    watcher: Option<ConfigWatcher>,
    shutdown: ShutdownCoordinator,
    max_cycles: Option<u64>,
}

impl WatchRuntime {
    /// Creates a runtime over an existing client.
    pub fn new(service: Arc<PlcService>, poll: PollSettings) -> Self {
        Self {
            service,
            poll,
            watcher: None,
            shutdown: ShutdownCoordinator::new(),
            max_cycles: None,
        }
    }

    /// Reloads the configuration through `watcher`.
    pub fn with_watcher(mut self, watcher: ConfigWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Uses an existing shutdown coordinator.
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Stops after `cycles` inspection cycles.
    pub fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    /// Returns a handle that stops the loop.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs until shutdown or the cycle limit, then closes the link.
    pub async fn run(mut self) -> BinResult<WatchSummary> {
        let map = self.service.register_map();
        info!(
            endpoint = %map.endpoint,
            interval = ?self.poll.interval,
            reload = self.watcher.is_some(),
            "Watching PLC"
        );

        let mut rx = self.shutdown.subscribe();
        let mut state = LoopState::default();

        let result = loop {
            if self.shutdown.is_shutdown_initiated() || self.limit_reached(&state) {
                break Ok(());
            }
            if let Err(e) = self.tick(&mut state).await {
                break Err(e);
            }
            if self.limit_reached(&state) {
                break Ok(());
            }

            tokio::select! {
                _ = rx.recv() => break Ok(()),
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        };

        self.service.shutdown().await;

        let summary = state.summary;
        info!(
            cycles = summary.cycles,
            passes = summary.passes,
            fails = summary.fails,
            unknowns = summary.unknowns,
            "Watch stopped"
        );
        result.map(|()| summary)
    }

    fn limit_reached(&self, state: &LoopState) -> bool {
        self.max_cycles
            .is_some_and(|max| state.summary.cycles >= max)
    }

    async fn tick(&mut self, state: &mut LoopState) -> BinResult<()> {
        let now = Instant::now();

        self.reload_if_due(state, now);

        let check_due = state
            .last_check
            .map_or(true, |at| now.duration_since(at) >= self.poll.connection_check_interval);
        if check_due {
            let connected = self.service.check_connection(self.poll.tcp_only_check).await?;
            match (state.connected, connected) {
                (Some(true), true) => {}
                (_, true) => info!("PLC reachable"),
                (Some(false), false) => debug!("PLC still unreachable"),
                (_, false) => warn!("PLC unreachable"),
            }
            state.connected = Some(connected);
            state.last_check = Some(now);
        }

        if state.connected == Some(false) {
            return Ok(());
        }

        let trigger_on = self.service.is_external_trigger_on().await?;
        if trigger_on && !state.trigger_high {
            let cycle = self.inspect().await?;
            state.summary.record(cycle.verdict);
        }
        state.trigger_high = trigger_on;

        Ok(())
    }

    fn reload_if_due(&mut self, state: &mut LoopState, now: Instant) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        if state
            .last_reload
            .is_some_and(|at| now.duration_since(at) < self.poll.reload_interval)
        {
            return;
        }
        state.last_reload = Some(now);

        match watcher.reload_if_changed() {
            Ok(Some(config)) => {
                let update = self.service.apply_options(&config.plc);
                self.poll = config.poll;
                state.summary.reloads += 1;
                if update.endpoint_changed {
                    state.connected = None;
                    state.last_check = None;
                }
                info!(
                    endpoint = %update.map.endpoint,
                    endpoint_changed = update.endpoint_changed,
                    "Configuration reloaded"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Config reload failed; keeping current settings"),
        }
    }

    /// Handles one trigger.
    async fn inspect(&self) -> BinResult<InspectionCycle> {
        let verdict = self
            .service
            .read_result_status(self.poll.clear_after_result)
            .await?;

        let qr = if self.poll.read_qr {
            Some(self.service.read_plc_qr_string().await?)
        } else {
            None
        };

        let work_order_missing = self.service.read_work_order_missing_flag().await?;

        if self.poll.clear_trigger_after_result {
            self.service.clear_trigger_register().await?;
        }

        info!(
            %verdict,
            qr = qr.as_deref().unwrap_or(""),
            work_order_missing = ?work_order_missing,
            "Inspection cycle"
        );

        Ok(InspectionCycle {
            verdict,
            qr,
            work_order_missing,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
