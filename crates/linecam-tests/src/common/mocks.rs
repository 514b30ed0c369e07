// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # In-memory PLC
//!
//! [`MockPlc`] stands in for the Modbus/TCP device. It implements
//! [`Connector`], so it plugs straight into
//! [`PlcService::with_connector`]; every link it hands out shares the same
//! register image.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Thread-safe for concurrent testing
//! - Easy to set up error injection

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use linecam_modbus::error::ConnectionError;
use linecam_modbus::{
    Connector, Endpoint, ModbusError, ModbusResult, ModbusTransport, PlcOptions, PlcService,
    TimingSettings,
};

// =============================================================================
// Request log
// =============================================================================

/// One request as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// FC 03.
    ReadHolding { start: u16, count: u16 },
    /// FC 04.
    ReadInput { start: u16, count: u16 },
    /// FC 06.
    WriteRegister { address: u16, value: u16 },
    /// FC 05.
    WriteCoil { address: u16, value: bool },
}

impl Request {
    /// Returns `true` for FC 05 and FC 06.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::WriteRegister { .. } | Self::WriteCoil { .. })
    }

    fn function_code(&self) -> u8 {
        match self {
            Self::ReadHolding { .. } => 0x03,
            Self::ReadInput { .. } => 0x04,
            Self::WriteCoil { .. } => 0x05,
            Self::WriteRegister { .. } => 0x06,
        }
    }

    fn span(&self) -> (u32, u32) {
        match *self {
            Self::ReadHolding { start, count } | Self::ReadInput { start, count } => {
                (u32::from(start), u32::from(start) + u32::from(count))
            }
            Self::WriteRegister { address, .. } | Self::WriteCoil { address, .. } => {
                (u32::from(address), u32::from(address) + 1)
            }
        }
    }
}

// =============================================================================
// Device state
// =============================================================================

#[derive(Debug)]
struct PlcState {
    holding: HashMap<u16, u16>,
    input: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    /// Values returned by successive reads before the stored value.
    scripted: HashMap<u16, VecDeque<u16>>,
    exceptions: HashMap<u16, u8>,
    pending_faults: u32,
    refuse_connections: bool,
    reachable: bool,
    requests: Vec<Request>,
    connects: Vec<Endpoint>,
    slave_changes: Vec<u8>,
    timeout_changes: Vec<(Duration, Duration)>,
    disconnects: u64,
}

impl Default for PlcState {
    fn default() -> Self {
        Self {
            holding: HashMap::new(),
            input: HashMap::new(),
            coils: HashMap::new(),
            scripted: HashMap::new(),
            exceptions: HashMap::new(),
            pending_faults: 0,
            refuse_connections: false,
            reachable: true,
            requests: Vec::new(),
            connects: Vec::new(),
            slave_changes: Vec::new(),
            timeout_changes: Vec::new(),
            disconnects: 0,
        }
    }
}

impl PlcState {
    /// Logs `request` and applies injected faults.
    fn admit(&mut self, request: Request) -> ModbusResult<()> {
        self.requests.push(request);

        if self.pending_faults > 0 {
            self.pending_faults -= 1;
            return Err(ModbusError::connection(ConnectionError::closed("injected fault")));
        }

        let (from, to) = request.span();
        for address in from..to {
            if let Some(&code) = u16::try_from(address).ok().and_then(|a| self.exceptions.get(&a)) {
                return Err(ModbusError::exception(request.function_code(), code));
            }
        }
        Ok(())
    }

    fn read_holding(&mut self, address: u16) -> u16 {
        if let Some(value) = self.scripted.get_mut(&address).and_then(VecDeque::pop_front) {
            return value;
        }
        self.holding.get(&address).copied().unwrap_or(0)
    }
}

// =============================================================================
// MockPlc
// =============================================================================

/// A configurable in-memory Modbus device.
#[derive(Debug, Clone, Default)]
pub struct MockPlc {
    state: Arc<Mutex<PlcState>>,
}

impl MockPlc {
    /// Creates a device with every register at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`PlcService`] wired to this device.
    pub fn service(&self, options: &PlcOptions) -> PlcService {
        PlcService::with_connector(options, self.connector())
    }

    /// Returns this device as a connector.
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    // -------------------------------------------------------------------------
    // Register image
    // -------------------------------------------------------------------------

    /// Sets a holding register.
    pub fn set_holding(&self, address: u16, value: u16) {
        self.state.lock().holding.insert(address, value);
    }

    /// Sets consecutive holding registers starting at `start`.
    pub fn set_holding_words(&self, start: u16, words: &[u16]) {
        let mut state = self.state.lock();
        for (address, &word) in (start..).zip(words) {
            state.holding.insert(address, word);
        }
    }

    /// Returns a holding register.
    pub fn holding(&self, address: u16) -> u16 {
        self.state.lock().holding.get(&address).copied().unwrap_or(0)
    }

    /// Sets an input register.
    pub fn set_input(&self, address: u16, value: u16) {
        self.state.lock().input.insert(address, value);
    }

    /// Returns a coil.
    pub fn coil(&self, address: u16) -> bool {
        self.state.lock().coils.get(&address).copied().unwrap_or(false)
    }

    /// Successive reads of `address` return `values` in order, then the
    /// stored value.
    pub fn script_holding(&self, address: u16, values: &[u16]) {
        self.state
            .lock()
            .scripted
            .insert(address, values.iter().copied().collect());
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Any request touching `address` gets exception `code`.
    pub fn raise_exception(&self, address: u16, code: u8) {
        self.state.lock().exceptions.insert(address, code);
    }

    /// Removes an injected exception.
    pub fn clear_exception(&self, address: u16) {
        self.state.lock().exceptions.remove(&address);
    }

    /// The next `count` requests fail with a transport fault.
    pub fn inject_transport_faults(&self, count: u32) {
        self.state.lock().pending_faults = count;
    }

    /// Refuses (or accepts again) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// Sets what a port probe reports.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Writes received, in order.
    pub fn writes(&self) -> Vec<Request> {
        self.requests().into_iter().filter(Request::is_write).collect()
    }

    /// Register writes to `address`, in order.
    pub fn register_writes(&self, address: u16) -> Vec<u16> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::WriteRegister { address: a, value } if a == address => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Coil writes, in order.
    pub fn coil_writes(&self) -> Vec<(u16, bool)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::WriteCoil { address, value } => Some((address, value)),
                _ => None,
            })
            .collect()
    }

    /// Forgets the request log.
    pub fn clear_log(&self) {
        self.state.lock().requests.clear();
    }

    /// Links opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects.len()
    }

    /// Endpoint of every link opened, in order.
    pub fn connected_endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().connects.clone()
    }

    /// Station ids set on open links.
    pub fn slave_changes(&self) -> Vec<u8> {
        self.state.lock().slave_changes.clone()
    }

    /// Read and write timeouts pushed to open links.
    pub fn timeout_changes(&self) -> Vec<(Duration, Duration)> {
        self.state.lock().timeout_changes.clone()
    }

    /// Links closed so far.
    pub fn disconnect_count(&self) -> u64 {
        self.state.lock().disconnects
    }
}

#[async_trait]
impl Connector for MockPlc {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _timing: &TimingSettings,
    ) -> ModbusResult<Box<dyn ModbusTransport>> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(ModbusError::connection(ConnectionError::refused(
                endpoint.host.clone(),
                endpoint.port,
            )));
        }
        state.connects.push(endpoint.clone());

        Ok(Box::new(MockLink {
            state: Arc::clone(&self.state),
            peer: endpoint.socket_addr(),
        }))
    }

    async fn probe(&self, _endpoint: &Endpoint, _limit: Duration) -> bool {
        self.state.lock().reachable
    }
}

// =============================================================================
// MockLink
// =============================================================================

struct MockLink {
    state: Arc<Mutex<PlcState>>,
    peer: String,
}

#[async_trait]
impl ModbusTransport for MockLink {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let mut state = self.state.lock();
        state.admit(Request::ReadHolding { start: address, count })?;
        Ok((0..count)
            .map(|offset| state.read_holding(address.wrapping_add(offset)))
            .collect())
    }

    async fn read_input_registers(&mut self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let mut state = self.state.lock();
        state.admit(Request::ReadInput { start: address, count })?;
        Ok((0..count)
            .map(|offset| {
                state
                    .input
                    .get(&address.wrapping_add(offset))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        let mut state = self.state.lock();
        state.admit(Request::WriteRegister { address, value })?;
        state.holding.insert(address, value);
        Ok(())
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        let mut state = self.state.lock();
        state.admit(Request::WriteCoil { address, value })?;
        state.coils.insert(address, value);
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.state.lock().disconnects += 1;
        Ok(())
    }

    fn set_slave(&mut self, slave_id: u8) {
        self.state.lock().slave_changes.push(slave_id);
    }

    fn set_timeouts(&mut self, read: Duration, write: Duration) {
        self.state.lock().timeout_changes.push((read, write));
    }

    fn peer(&self) -> String {
        format!("mock://{}", self.peer)
    }
}
