// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for configuration loading and normalization.

use std::fs;
use std::time::Duration;

use linecam_config::{ConfigError, ConfigFormat, ConfigLoader, LogLevel};
use linecam_modbus::{PlcOptions, RegisterMap};
use linecam_tests::prelude::*;

fn isolated_loader(tag: &str) -> ConfigLoader {
    ConfigLoader::new().with_env_prefix(format!("LINECAM_IT_{tag}"))
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_normalized_snapshot_stays_in_range() {
    let hostile = [-1_000_000i64, -1, 0, 1, 15, 16, 255, 256, 257, 65_535, 65_536, i64::MAX];

    for &value in &hostile {
        let options = PlcOptions {
            port: value,
            pass_bit: value,
            fail_bit: value,
            manual_trigger_bit: value,
            external_trigger_guard_bit: value,
            work_order_missing_bit: value,
            qr_length: value,
            ..PlcOptions::default()
        };
        let map = RegisterMap::from_options(&options);

        assert!(map.endpoint.port > 0, "port for {value}");
        assert!((1..=256).contains(&map.qr.length), "qr length for {value}");
        for bit in [map.pass, map.fail, map.manual_trigger, map.guard, map.work_order_missing] {
            assert!(bit.bit() <= 15, "bit for {value}");
        }
    }
}

#[test]
fn test_invalid_values_fall_back_to_factory_defaults() {
    let options = PlcOptions {
        ip: "  ".into(),
        port: 0,
        result_register: -3,
        trigger_addresses: vec![],
        ..PlcOptions::default()
    };
    let map = RegisterMap::from_options(&options);
    let defaults = RegisterMap::default();

    assert_eq!(map.endpoint, defaults.endpoint);
    assert_eq!(map.result_register, defaults.result_register);
    assert_eq!(map.trigger_addresses, defaults.trigger_addresses);
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_loaded_file_drives_register_map() {
    let dir = temp_test_dir("linecam-config");
    let path = dir.path().join("line.yaml");
    fs::write(&path, config_yaml("10.1.2.3")).unwrap();

    let config = isolated_loader("FILE").load(&path).unwrap();
    assert_eq!(config.poll.interval, Duration::from_millis(50));
    assert_eq!(config.logging.level, LogLevel::Warn);

    let map = RegisterMap::from_options(&config.plc);
    assert_eq!(map.endpoint.host, "10.1.2.3");
    assert_eq!(map.endpoint.port, 502);
}

#[test]
fn test_formats_agree() {
    let yaml = "plc:\n  ip: 10.0.0.9\n  qr_length: 16\n";
    let toml = "[plc]\nip = \"10.0.0.9\"\nqr_length = 16\n";
    let json = r#"{"plc": {"ip": "10.0.0.9", "qr_length": 16}}"#;

    let loader = isolated_loader("FORMATS");
    let from_yaml = loader.load_from_str(yaml, ConfigFormat::Yaml).unwrap();
    let from_toml = loader.load_from_str(toml, ConfigFormat::Toml).unwrap();
    let from_json = loader.load_from_str(json, ConfigFormat::Json).unwrap();

    assert_eq!(from_yaml, from_toml);
    assert_eq!(from_toml, from_json);
    assert_eq!(from_json.plc.qr_length, 16);
}

#[test]
fn test_env_overrides_take_precedence() {
    std::env::set_var("LINECAM_IT_ENV_PLC_IP", "192.168.50.10");
    std::env::set_var("LINECAM_IT_ENV_PLC_SLAVE_ID", "4");

    let config = isolated_loader("ENV")
        .load_from_str(&config_yaml("10.0.0.1"), ConfigFormat::Yaml)
        .unwrap();

    std::env::remove_var("LINECAM_IT_ENV_PLC_IP");
    std::env::remove_var("LINECAM_IT_ENV_PLC_SLAVE_ID");

    assert_eq!(config.plc.ip, "192.168.50.10");
    assert_eq!(config.plc.slave_id, 4);
}

#[test]
fn test_bad_env_override_is_reported() {
    std::env::set_var("LINECAM_IT_BADENV_PLC_PORT", "not-a-port");
    let result = isolated_loader("BADENV").load_from_str("{}", ConfigFormat::Json);
    std::env::remove_var("LINECAM_IT_BADENV_PLC_PORT");

    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
fn test_out_of_range_poll_interval_is_rejected() {
    let result = isolated_loader("POLL")
        .load_from_str("poll:\n  interval: 10ms\n", ConfigFormat::Yaml);
    assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
}

#[test]
fn test_unknown_key_is_rejected() {
    let result = isolated_loader("UNKNOWN")
        .load_from_str(r#"{"plcs": {}}"#, ConfigFormat::Json);
    assert!(result.is_err());
}

#[test]
fn test_missing_file() {
    let dir = temp_test_dir("linecam-missing");
    let result = isolated_loader("MISSING").load(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}
