// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One-shot device commands.
//!
//! Each command opens its own client, performs one operation and closes the
//! link. Negative results (trigger not fired, PLC unreachable) exit with the
//! device error code.

use linecam_config::AppConfig;
use linecam_modbus::PlcService;
use serde_json::json;

use super::emit;
use crate::cli::{
    BarcodeArgs, CheckArgs, Commands, FireArgs, OutputFormat, PulseBitArgs, ReadArgs,
    ResultArgs, TriggerArgs, WorkOrderArgs,
};
use crate::error::{BinError, BinResult};

/// Runs a device command against the configured PLC.
pub async fn run(command: Commands, config: &AppConfig, output: OutputFormat) -> BinResult<()> {
    let service = PlcService::new(&config.plc);
    let result = dispatch(&service, command, output).await;
    service.shutdown().await;
    result
}

async fn dispatch(service: &PlcService, command: Commands, output: OutputFormat) -> BinResult<()> {
    match command {
        Commands::Trigger(args) => trigger(service, args, output).await,
        Commands::PulseBit(args) => pulse_bit(service, args, output).await,
        Commands::Fire(args) => fire(service, args, output).await,
        Commands::Raise => raise(service, output).await,
        Commands::Result(args) => result(service, args, output).await,
        Commands::Qr => qr(service, output).await,
        Commands::Barcode(args) => barcode(service, args, output).await,
        Commands::Signals => signals(service, output).await,
        Commands::WorkOrder(args) => work_order(service, args, output).await,
        Commands::Read(args) => read(service, args, output).await,
        Commands::Check(args) => check(service, args, output).await,
        Commands::Watch(_) | Commands::Validate(_) | Commands::Version => {
            Err(BinError::runtime("not a device command"))
        }
    }
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "on",
        Some(false) => "off",
        None => "unavailable",
    }
}

fn require(done: bool, what: &str) -> BinResult<()> {
    if done {
        Ok(())
    } else {
        Err(BinError::device(format!("{what} failed")))
    }
}

// =============================================================================
// Actuation
// =============================================================================

async fn trigger(service: &PlcService, args: TriggerArgs, output: OutputFormat) -> BinResult<()> {
    let timing = service.register_map().timing.clone();
    let pulse = args.pulse.unwrap_or(timing.pulse);
    let min_gap = args.min_gap.unwrap_or(timing.trigger_min_gap);

    let fired = service.trigger_once_with(pulse, min_gap).await?;
    emit(
        output,
        if fired { "Trigger fired" } else { "Trigger not fired" },
        json!({ "fired": fired, "pulse_ms": pulse.as_millis() }),
    );
    require(fired, "trigger")
}

async fn pulse_bit(service: &PlcService, args: PulseBitArgs, output: OutputFormat) -> BinResult<()> {
    let map = service.register_map();
    let (register, bit) = match (args.register, args.bit) {
        (Some(register), Some(bit)) => (register, bit),
        _ => (map.manual_trigger.register(), map.manual_trigger.bit()),
    };

    let done = match args.pulse {
        Some(pulse) => service.pulse_register_bit_for(register, bit, pulse).await?,
        None if args.register.is_none() => service.pulse_manual_trigger_bit().await?,
        None => service.pulse_register_bit(register, bit).await?,
    };

    emit(
        output,
        format!("D{register}.{bit}: {}", if done { "pulsed" } else { "not pulsed" }),
        json!({ "register": register, "bit": bit, "pulsed": done }),
    );
    require(done, "bit pulse")
}

async fn fire(service: &PlcService, args: FireArgs, output: OutputFormat) -> BinResult<()> {
    let map = service.register_map();
    let pulse = args.pulse.unwrap_or(map.timing.pulse);

    let done = service
        .write_external_trigger_fire_register(args.value, pulse, args.release)
        .await?;

    emit(
        output,
        format!("D{} <- {}{}", map.fire_register, args.value, if args.release { " (released)" } else { "" }),
        json!({
            "register": map.fire_register,
            "value": args.value,
            "release": args.release,
            "written": done,
        }),
    );
    require(done, "fire register write")
}

async fn raise(service: &PlcService, output: OutputFormat) -> BinResult<()> {
    let done = service.raise_external_trigger().await?;
    emit(
        output,
        if done { "Trigger flag raised" } else { "Trigger flag not raised" },
        json!({ "raised": done }),
    );
    require(done, "trigger raise")
}

// =============================================================================
// Reads
// =============================================================================

async fn result(service: &PlcService, args: ResultArgs, output: OutputFormat) -> BinResult<()> {
    let verdict = service.read_result_status(args.clear).await?;
    emit(output, verdict, json!({ "verdict": verdict, "cleared": args.clear }));
    Ok(())
}

async fn qr(service: &PlcService, output: OutputFormat) -> BinResult<()> {
    let text = service.read_plc_qr_string().await?;
    emit(output, &text, json!({ "qr": text }));
    Ok(())
}

async fn barcode(service: &PlcService, args: BarcodeArgs, output: OutputFormat) -> BinResult<()> {
    let layout = service.register_map().barcode;
    let start = args.start.unwrap_or(layout.start);
    let chars = args.chars.unwrap_or(layout.chars);
    let words_per_char = args.words_per_char.unwrap_or(layout.words_per_char);

    let text = service.read_camera_barcode(start, chars, words_per_char).await?;
    emit(
        output,
        &text,
        json!({ "barcode": text, "start": start, "chars": chars, "words_per_char": words_per_char }),
    );
    Ok(())
}

async fn signals(service: &PlcService, output: OutputFormat) -> BinResult<()> {
    let (pass, fail) = service.read_pass_fail_signals().await?;
    let trigger = service.is_external_trigger_on().await?;
    let guard = service.read_external_trigger_guard_register().await?;
    let guard_active = service.is_external_trigger_guard_active().await?;
    let signal = service.read_external_trigger_signal().await?;
    let ready = service.read_external_trigger_ready_bit().await?;
    let missing = service.read_work_order_missing_flag().await?;

    let text = format!(
        "PASS:               {}\n\
         FAIL:               {}\n\
         Trigger flag:       {}\n\
         Guard register:     {}\n\
         Guard active:       {}\n\
         Trigger signal:     {}\n\
         Camera ready:       {}\n\
         Work order missing: {}",
        flag(Some(pass)),
        flag(Some(fail)),
        flag(Some(trigger)),
        guard.map_or_else(|| "unavailable".to_string(), |v| v.to_string()),
        flag(Some(guard_active)),
        flag(signal),
        flag(ready),
        flag(missing),
    );

    emit(
        output,
        text,
        json!({
            "pass": pass,
            "fail": fail,
            "trigger_flag": trigger,
            "guard_register": guard,
            "guard_active": guard_active,
            "trigger_signal": signal,
            "camera_ready": ready,
            "work_order_missing": missing,
        }),
    );
    Ok(())
}

async fn work_order(service: &PlcService, args: WorkOrderArgs, output: OutputFormat) -> BinResult<()> {
    if args.ready || args.clear {
        let done = service.set_work_order_ready(args.ready).await?;
        emit(
            output,
            format!("Work-order ready <- {}", u8::from(args.ready)),
            json!({ "ready": args.ready, "written": done }),
        );
        return require(done, "work-order write");
    }

    let ready = service.read_work_order_ready().await?;
    let missing = service.read_work_order_missing_flag().await?;
    emit(
        output,
        format!("Ready:   {}\nMissing: {}", flag(ready), flag(missing)),
        json!({ "ready": ready, "missing": missing }),
    );
    Ok(())
}

async fn read(service: &PlcService, args: ReadArgs, output: OutputFormat) -> BinResult<()> {
    let words = service.read_holding_registers(args.start, args.count).await?;

    let text = words
        .iter()
        .zip(u32::from(args.start)..)
        .map(|(value, address)| format!("HR{address}: {value} (0x{value:04X})"))
        .collect::<Vec<_>>()
        .join("\n");
    emit(output, text, json!({ "start": args.start, "values": words }));
    Ok(())
}

// =============================================================================
// Connectivity
// =============================================================================

async fn check(service: &PlcService, args: CheckArgs, output: OutputFormat) -> BinResult<()> {
    let connected = service.check_connection(args.tcp_only).await?;
    let camera = service.camera_status().await?;
    let stats = service.stats();
    let endpoint = service.register_map().endpoint.clone();

    emit(
        output,
        format!(
            "PLC {endpoint}: {}\nCamera: {camera}",
            if connected { "connected" } else { "unreachable" }
        ),
        json!({
            "endpoint": endpoint.to_string(),
            "connected": connected,
            "camera": camera,
            "stats": stats,
        }),
    );
    require(connected, "connection check")
}
