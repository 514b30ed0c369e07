// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! linecam - Modbus/TCP client for PLC and vision camera lines.

use linecam_bin::error::report_error_and_exit;
use linecam_bin::{commands, init_logging, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let config = commands::load_app_config(&cli);
    let logging = cli.logging_settings(config.as_ref().ok().map(|c| &c.logging));
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = commands::execute(cli, config).await {
        report_error_and_exit(e);
    }
}
