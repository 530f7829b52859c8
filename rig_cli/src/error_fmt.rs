//! Human-readable error descriptions and structured JSON error formatting.

use rig_core::RigError;

fn reason_name(e: &RigError) -> &'static str {
    match e {
        RigError::UnknownPump(_) => "UnknownPump",
        RigError::UncalibratedPump(_) => "UncalibratedPump",
        RigError::CalibrationPersist(_) => "CalibrationPersist",
        RigError::MeasurementFailed(_) => "MeasurementFailed",
        RigError::TravelLimit { .. } => "TravelLimit",
        RigError::UnknownDevice { .. } => "UnknownDevice",
        RigError::InvalidVolume(_) => "InvalidVolume",
        RigError::Hardware(_) => "Hardware",
        RigError::Timeout => "Timeout",
        RigError::Cancelled => "Cancelled",
        RigError::Config(_) => "Config",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RigError>() {
        return match re {
            RigError::UncalibratedPump(p) => format!(
                "What happened: Pump {p} has no stored rate.\nLikely causes: Calibration was never run for this rig, or the calibration file was deleted.\nHow to fix: Run `rig calibrate` and enter the balance readings when prompted."
            ),
            RigError::UnknownPump(p) => format!(
                "What happened: No board carries a pump named {p}.\nLikely causes: Typo in the pump name or plan header, or [boards] does not list it.\nHow to fix: Check the name against `rig self-check` and the [boards] section."
            ),
            RigError::UnknownDevice { board, device } => format!(
                "What happened: Board {board} has no device {device}.\nLikely causes: [motion] names a device that [boards] does not list.\nHow to fix: Make the device names in [motion] and [boards] agree."
            ),
            RigError::MeasurementFailed(msg) => format!(
                "What happened: The pH reading failed ({msg}).\nLikely causes: The pH server is not running, the acquisition unit faulted, or the timeout is shorter than the settle delay.\nHow to fix: Start `rig ph-server`, check its log, and compare measurement.timeout_ms with measurement.settle_ms."
            ),
            RigError::TravelLimit { position, limit } => format!(
                "What happened: Probe position {position} is outside its travel [0, {limit}].\nLikely causes: Wrong position or an unexpected motion.probe_travel_limit.\nHow to fix: Pick a position between 0 and {limit}."
            ),
            RigError::CalibrationPersist(msg) => format!(
                "What happened: The calibration could not be written ({msg}).\nLikely causes: rig.calibration_dir is missing or not writable.\nHow to fix: Fix the directory permissions and calibrate again; the new rates only lived for this session."
            ),
            RigError::InvalidVolume(v) => format!(
                "What happened: {v} is not a volume that can be dispensed.\nLikely causes: Negative or non-numeric value.\nHow to fix: Pass a volume >= 0."
            ),
            RigError::Cancelled => "What happened: The operation was cancelled.\nLikely causes: Ctrl-C, or a tray change was not acknowledged.\nHow to fix: Check the rig state, then start again.".to_string(),
            RigError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            RigError::Hardware(_) | RigError::Timeout => format!(
                "What happened: {re}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // `{:#}` keeps the whole context chain ("invalid configuration: ...").
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();
    if lower.contains("parse config") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A typo in the TOML or an out-of-range value.\nHow to fix: Edit the config file and try again."
        );
    }
    if lower.contains("plan") && lower.contains("csv") {
        return format!(
            "What happened: The plan could not be read ({msg}).\nLikely causes: Missing `reaction` header column or a non-numeric volume.\nHow to fix: Fix the CSV; empty cells mean no dose."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure kind; everything else exits 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RigError>() {
        Some(RigError::UncalibratedPump(_)) => 3,
        Some(RigError::UnknownPump(_) | RigError::UnknownDevice { .. }) => 4,
        Some(RigError::MeasurementFailed(_)) => 5,
        Some(RigError::TravelLimit { .. }) => 6,
        Some(RigError::CalibrationPersist(_)) => 7,
        Some(RigError::Cancelled) => 130,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = err.downcast_ref::<RigError>().map_or("Error", reason_name);
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
