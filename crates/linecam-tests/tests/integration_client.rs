// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for connection handling and request serialization.

use std::sync::Arc;
use std::time::Duration;

use linecam_modbus::{ModbusError, PlcOptions, TransportState};
use linecam_tests::prelude::*;

// =============================================================================
// Retry and reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_fault_reconnects_and_retries_once() {
    init_test_logging();
    let plc = MockPlc::new();
    plc.set_holding(4112, 1);
    let service = plc.service(&plc_options());

    plc.inject_transport_faults(1);
    let words = service.read_holding_registers(4112, 1).await.unwrap();

    assert_eq!(words, vec![1]);
    assert_eq!(plc.connect_count(), 2);
    assert_eq!(plc.requests().len(), 2);

    let stats = service.stats();
    assert_eq!(stats.connects, 2);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.transport_faults, 1);
    assert_eq!(stats.consecutive_failures, 0);
    assert_eq!(service.transport_state(), TransportState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_second_fault_gives_up() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());

    plc.inject_transport_faults(2);
    let err = service.read_holding_registers(4112, 1).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(plc.requests().len(), 2);
    assert_eq!(service.stats().consecutive_failures, 2);
    assert_eq!(service.transport_state(), TransportState::Disconnected);

    // The degraded surface reports the same fault as a negative result.
    plc.inject_transport_faults(2);
    assert!(!service.is_external_trigger_on().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_writes_without_retry_are_attempted_once() {
    let plc = MockPlc::new();
    plc.set_holding(4112, 1);
    let service = plc.service(&plc_options());

    plc.inject_transport_faults(1);
    assert!(!service.clear_result_register().await.unwrap());

    assert_eq!(plc.register_writes(4112), vec![0]);
    assert_eq!(plc.holding(4112), 1);
    assert_eq!(service.stats().retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_exception_keeps_link_open() {
    let plc = MockPlc::new();
    plc.raise_exception(4112, 0x02);
    let service = plc.service(&plc_options());

    let err = service.read_holding_registers(4112, 1).await.unwrap_err();
    assert_eq!(err.exception_code(), Some(0x02));
    assert_eq!(service.transport_state(), TransportState::Connected);

    plc.clear_exception(4112);
    service.read_holding_registers(4112, 1).await.unwrap();
    assert_eq!(plc.connect_count(), 1);
    assert_eq!(service.stats().protocol_faults, 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_degrades() {
    let plc = MockPlc::new();
    plc.refuse_connections(true);
    let service = plc.service(&plc_options());

    assert_eq!(service.read_plc_qr_string().await.unwrap(), "");
    assert_eq!(service.read_work_order_ready().await.unwrap(), None);
    assert_eq!(service.read_pass_fail_signals().await.unwrap(), (false, false));
    assert!(plc.requests().is_empty());

    plc.refuse_connections(false);
    assert_eq!(service.read_work_order_ready().await.unwrap(), Some(false));
}

// =============================================================================
// Endpoint changes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_endpoint_change_opens_new_connection() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());

    service.read_work_order_ready().await.unwrap();
    assert_eq!(plc.connect_count(), 1);

    let update = service.apply_options(&PlcOptions {
        ip: "10.0.0.6".into(),
        ..plc_options()
    });
    assert!(update.endpoint_changed);

    service.read_work_order_ready().await.unwrap();
    let endpoints = plc.connected_endpoints();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].host, TEST_HOST);
    assert_eq!(endpoints[1].host, "10.0.0.6");
    assert_eq!(plc.disconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_port_change_opens_new_connection() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());
    service.read_work_order_ready().await.unwrap();

    let update = service.apply_options(&PlcOptions {
        port: 5020,
        ..plc_options()
    });
    assert!(update.endpoint_changed);

    service.read_work_order_ready().await.unwrap();
    assert_eq!(plc.connected_endpoints()[1].port, 5020);
}

#[tokio::test(start_paused = true)]
async fn test_slave_id_change_keeps_connection() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());
    service.read_work_order_ready().await.unwrap();

    let update = service.apply_options(&PlcOptions {
        slave_id: 7,
        ..plc_options()
    });
    assert!(!update.endpoint_changed);

    service.read_work_order_ready().await.unwrap();
    assert_eq!(plc.connect_count(), 1);
    assert_eq!(plc.slave_changes(), vec![7]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_change_reaches_open_link() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());
    service.read_work_order_ready().await.unwrap();

    let mut options = plc_options();
    options.timing.read_timeout = Duration::from_millis(750);
    options.timing.write_timeout = Duration::from_millis(400);
    options.timing.warn_interval = Duration::from_millis(100);
    let update = service.apply_options(&options);
    assert!(!update.endpoint_changed);

    service.read_work_order_ready().await.unwrap();
    assert_eq!(
        plc.timeout_changes(),
        vec![(Duration::from_millis(750), Duration::from_millis(400))]
    );
    assert_eq!(plc.connect_count(), 1);

    // Unchanged settings are not pushed again.
    service.read_work_order_ready().await.unwrap();
    assert_eq!(plc.timeout_changes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_change_applies_without_reconnect() {
    let plc = MockPlc::new();
    plc.set_holding(4200, 1);
    let service = plc.service(&plc_options());
    assert!(!service.is_external_trigger_on().await.unwrap());

    service.apply_options(&PlcOptions {
        trigger_flag_register: 4200,
        ..plc_options()
    });
    assert!(service.is_external_trigger_on().await.unwrap());
    assert_eq!(plc.connect_count(), 1);
}

// =============================================================================
// Serialization
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_adjacent_pass_fail_registers_read_once() {
    let plc = MockPlc::new();
    plc.set_holding(3000, 0b1);
    let service = plc.service(&plc_options());

    assert_eq!(service.read_pass_fail_signals().await.unwrap(), (true, false));
    assert_eq!(
        plc.requests(),
        vec![Request::ReadHolding { start: 3000, count: 2 }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_link() {
    let plc = MockPlc::new();
    let service = Arc::new(plc.service(&plc_options()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.read_work_order_ready().await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), Some(false));
    }

    assert_eq!(plc.connect_count(), 1);
    assert_eq!(plc.requests().len(), 8);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_link_and_refuses_calls() {
    let plc = MockPlc::new();
    let service = plc.service(&plc_options());
    service.read_work_order_ready().await.unwrap();

    service.shutdown().await;
    assert_eq!(plc.disconnect_count(), 1);
    assert_eq!(service.transport_state(), TransportState::Disconnected);

    assert!(matches!(
        service.read_work_order_ready().await,
        Err(ModbusError::Cancelled)
    ));
    assert!(matches!(
        service.set_work_order_ready(true).await,
        Err(ModbusError::Cancelled)
    ));
    assert_eq!(plc.requests().len(), 1);

    service.shutdown().await;
    assert_eq!(plc.disconnect_count(), 1);
}
