// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use linecam_config::AppConfig;
use linecam_modbus::RegisterMap;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
///
/// PLC values that would be normalized on load are reported as warnings
/// rather than errors; the client falls back to defaults for them.
pub fn validate(cli: &Cli, args: ValidateArgs, config: BinResult<AppConfig>) -> BinResult<()> {
    let config_path = &cli.config;

    let config = config.map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let map = RegisterMap::from_options(&config.plc);
    let warnings = normalization_warnings(&config, &map);

    match cli.output {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  PLC:        {}", map.endpoint);
            println!("  Triggers:   {:?}", map.trigger_addresses);
            println!("  Result:     HR{}", map.result_register);
            println!("  Poll:       {:?}", config.poll.interval);
            println!("  Log level:  {}", config.logging.level.as_str());

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_map {
                println!();
                println!("Register map: {}", map);
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": map.endpoint.to_string(),
                    "trigger_addresses": map.trigger_addresses,
                    "result_register": map.result_register,
                    "poll_interval_ms": config.poll.interval.as_millis() as u64,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
        }
    }

    Ok(())
}

/// Lists PLC fields whose configured value differs from what the client
/// will use.
pub fn normalization_warnings(config: &AppConfig, map: &RegisterMap) -> Vec<String> {
    let plc = &config.plc;
    let mut warnings = Vec::new();

    let mut check = |field: &str, configured: i64, effective: i64| {
        if configured != effective {
            warnings.push(format!("plc.{field} = {configured} will be used as {effective}"));
        }
    };

    check("port", plc.port, i64::from(map.endpoint.port));
    check("slave_id", plc.slave_id, i64::from(map.endpoint.slave_id));
    check("pass_bit", plc.pass_bit, i64::from(map.pass.bit()));
    check("fail_bit", plc.fail_bit, i64::from(map.fail.bit()));
    check("qr_length", plc.qr_length, i64::from(map.qr.length));
    check("result_register", plc.result_register, i64::from(map.result_register));
    check("trigger_flag_register", plc.trigger_flag_register, i64::from(map.trigger_flag_register));
    check("stabilize_attempts", plc.stabilize_attempts, i64::from(map.stabilize_attempts));

    if plc.ip.trim().is_empty() {
        warnings.push(format!("plc.ip is empty; using {}", map.endpoint.host));
    }
    if plc.trigger_addresses.is_empty() {
        warnings.push(format!(
            "plc.trigger_addresses is empty; using {:?}",
            map.trigger_addresses
        ));
    }

    warnings
}
