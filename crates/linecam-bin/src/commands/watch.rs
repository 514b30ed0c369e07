// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.

use std::sync::Arc;

use linecam_config::{AppConfig, ConfigLoader, ConfigWatcher};
use linecam_modbus::PlcService;
use tracing::info;

use crate::cli::{Cli, OutputFormat, WatchArgs};
use crate::error::BinResult;
use crate::runtime::WatchRuntime;
use crate::shutdown::ShutdownCoordinator;

/// Executes the `watch` command.
pub async fn watch(cli: &Cli, args: WatchArgs, config: AppConfig) -> BinResult<()> {
    info!("Starting linecam v{}", crate::VERSION);

    let service = Arc::new(PlcService::new(&config.plc));
    let shutdown = ShutdownCoordinator::new();
    let listener = shutdown.spawn_signal_listener();

    let mut runtime = WatchRuntime::new(service, config.poll)
        .with_shutdown(shutdown)
        .with_max_cycles(args.cycles);

    if !args.no_reload && cli.config.exists() {
        runtime = runtime.with_watcher(ConfigWatcher::new(&cli.config, ConfigLoader::new()));
    }

    let summary = runtime.run().await;
    listener.abort();
    let summary = summary?;

    if cli.output == OutputFormat::Json {
        super::emit(
            cli.output,
            "",
            serde_json::to_value(summary).unwrap_or_default(),
        );
    }
    Ok(())
}
