// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for the `watch` polling loop.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use linecam_bin::{WatchRuntime, WatchSummary};
use linecam_config::{ConfigLoader, ConfigWatcher, PollSettings};
use linecam_tests::prelude::*;

/// Runs `runtime` while `script` drives the device, then stops it.
async fn run_with<F>(runtime: WatchRuntime, script: F) -> WatchSummary
where
    F: std::future::Future<Output = ()>,
{
    let handle = runtime.shutdown_handle();
    let (summary, ()) = tokio::join!(runtime.run(), async move {
        script.await;
        handle.initiate_shutdown();
    });
    summary.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_watch_handles_one_cycle() {
    init_test_logging();
    let plc = MockPlc::new();
    plc.set_holding(4096, 1);
    plc.set_holding(4112, 1);
    plc.set_holding_words(5000, &pack_low_first("WO-7781"));
    let service = Arc::new(plc.service(&plc_options()));

    let summary = WatchRuntime::new(Arc::clone(&service), fast_poll())
        .with_max_cycles(Some(1))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.passes, 1);
    assert_eq!(plc.holding(4112), 0);
    assert_eq!(plc.holding(4096), 0);
    assert!(service.is_shut_down());
}

#[tokio::test(start_paused = true)]
async fn test_watch_reacts_to_rising_edges_only() {
    let plc = MockPlc::new();
    plc.set_holding(4096, 1);
    plc.set_holding(4112, 1);
    let service = Arc::new(plc.service(&plc_options()));

    let poll = PollSettings {
        clear_trigger_after_result: false,
        ..fast_poll()
    };
    let runtime = WatchRuntime::new(Arc::clone(&service), poll);

    let summary = run_with(runtime, async {
        // The flag stays high: one cycle only.
        tokio::time::sleep(Duration::from_secs(1)).await;

        plc.set_holding(4096, 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        plc.set_holding(4112, 2);
        plc.set_holding(4096, 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
    })
    .await;

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.fails, 1);
}

#[tokio::test(start_paused = true)]
async fn test_watch_skips_polling_while_unreachable() {
    let plc = MockPlc::new();
    plc.set_holding(4096, 1);
    plc.set_reachable(false);
    let service = Arc::new(plc.service(&plc_options()));

    let runtime = WatchRuntime::new(service, fast_poll());
    let summary = run_with(runtime, async {
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    assert_eq!(summary.cycles, 0);
    assert!(plc.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_watch_applies_reloaded_endpoint() {
    let plc = MockPlc::new();
    let service = Arc::new(plc.service(&plc_options()));

    let dir = temp_test_dir("linecam-watch");
    let path = dir.path().join("line.yaml");
    fs::write(&path, config_yaml(TEST_HOST)).unwrap();

    let watcher = ConfigWatcher::new(
        &path,
        ConfigLoader::new().with_env_prefix("LINECAM_IT_WATCH"),
    );
    let runtime = WatchRuntime::new(Arc::clone(&service), fast_poll()).with_watcher(watcher);

    let summary = run_with(runtime, async {
        tokio::time::sleep(Duration::from_millis(300)).await;

        fs::write(&path, config_yaml("10.0.0.7")).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    assert_eq!(summary.reloads, 1);
    assert_eq!(service.register_map().endpoint.host, "10.0.0.7");

    let endpoints = plc.connected_endpoints();
    assert_eq!(endpoints.first().unwrap().host, TEST_HOST);
    assert_eq!(endpoints.last().unwrap().host, "10.0.0.7");
}
