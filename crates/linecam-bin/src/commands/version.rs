// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::{Cli, OutputFormat};
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(cli: &Cli) -> BinResult<()> {
    if cli.output == OutputFormat::Json {
        let info = serde_json::json!({
            "linecam-bin": crate::VERSION,
            "linecam-modbus": linecam_modbus::VERSION,
            "linecam-config": linecam_config::VERSION,
            "arch": std::env::consts::ARCH,
            "os": std::env::consts::OS,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_else(|_| info.to_string())
        );
        return Ok(());
    }

    println!("linecam - Modbus/TCP client for PLC and vision camera lines");
    println!();
    println!("Version Information:");
    println!("  linecam-bin:    {}", crate::VERSION);
    println!("  linecam-modbus: {}", linecam_modbus::VERSION);
    println!("  linecam-config: {}", linecam_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2021");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
