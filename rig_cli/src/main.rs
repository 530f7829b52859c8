#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod input;
mod logging;
mod sim;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use rig_config::Config;
use rig_config::ph::{load_ph_calibration, ph_calibration_path};
use rig_config::plan::load_plan_csv;
use rig_core::measurement::ServerOptions;
use rig_core::{MeasurementServer, Rig, RigBuilder, RigError, RunReport, run_plan};
use rig_hardware::SimulatedIndicator;
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE, ProbeCmd, StirTarget};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::input::{StdinOperator, StdinWeights};
use crate::sim::SimClock;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let remote = logging::init(&cfg, cli.json, &cli.log_level);
    tracing::debug!(rig = %cfg.rig.name, "config loaded");

    let result = dispatch(&cfg, cli.cmd, cli.json);

    if let Some(log) = remote {
        log.close();
    }
    result
}

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            toml::from_str::<Config>(&text).wrap_err("parse config")?
        }
        None => Config::default(),
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn build_rig(cfg: &Config) -> eyre::Result<Rig> {
    let ph_path = ph_calibration_path(&cfg.rig.calibration_dir, &cfg.rig.name);
    let ph = if ph_path.exists() {
        match load_ph_calibration(&ph_path) {
            Ok(cal) => cal,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring pH calibration file");
                None
            }
        }
    } else {
        None
    };

    let (main, secondary) = sim::boards(&cfg.boards);
    let rig = RigBuilder::from_config(cfg)?
        .with_boards(main, secondary)
        .with_ph_calibration(ph)
        .with_clock(SimClock::from_env())
        .build()?;

    // First Ctrl-C stops the current motion at the next pulse; a second one exits.
    let token = rig.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        token.cancel();
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
    Ok(rig)
}

/// Print a result line: the human text, or the JSON object in --json mode.
fn emit(json_mode: bool, human: impl AsRef<str>, value: serde_json::Value) {
    if json_mode {
        println!("{value}");
    } else {
        println!("{}", human.as_ref());
    }
}

fn run_json(r: &RunReport) -> serde_json::Value {
    json!({
        "planned_s": r.planned.as_secs_f64(),
        "elapsed_s": r.elapsed.as_secs_f64(),
        "pulses": r.pulses,
    })
}

fn dispatch(cfg: &Config, cmd: Commands, json_mode: bool) -> eyre::Result<()> {
    // The server owns the acquisition unit, not the boards.
    if matches!(cmd, Commands::PhServer) {
        return serve_ph(cfg, json_mode);
    }

    let mut rig = build_rig(cfg)?;
    match cmd {
        Commands::Dispense { pump, volume } => {
            let r = rig.dispense(&pump, volume)?;
            emit(
                json_mode,
                format!(
                    "dispensed {volume} from {pump} in {:.2} s ({} pulses)",
                    r.elapsed.as_secs_f64(),
                    r.pulses
                ),
                json!({ "pump": pump, "volume": volume, "run": run_json(&r) }),
            );
        }
        Commands::RunPump { pump, secs } => {
            let duration = Duration::try_from_secs_f64(secs)
                .map_err(|_| RigError::Config(format!("{secs} is not a run time")))?;
            let r = rig.run_pump(&pump, duration)?;
            emit(
                json_mode,
                format!("ran {pump} for {secs} s ({} pulses)", r.pulses),
                json!({ "pump": pump, "run": run_json(&r) }),
            );
        }
        Commands::Prime { skip } => {
            let skip: Vec<&str> = skip.iter().map(String::as_str).collect();
            rig.prime_pumps(&skip)?;
            emit(json_mode, "pumps primed", json!({ "primed": true, "skipped": skip }));
        }
        Commands::TurnWheel { turns } => {
            rig.turn_wheel(turns)?;
            emit(json_mode, format!("wheel turned {turns}"), json!({ "turns": turns }));
        }
        Commands::Probe { action } => {
            let (label, position) = match action {
                ProbeCmd::Raise => {
                    rig.raise_probe()?;
                    ("raised", 0)
                }
                ProbeCmd::Lower => {
                    rig.lower_probe()?;
                    ("lowered", cfg.motion.probe_travel_limit)
                }
                ProbeCmd::Move { position } => {
                    rig.move_probe(position)?;
                    ("moved", position)
                }
            };
            emit(
                json_mode,
                format!("probe {label} ({position})"),
                json!({ "probe": label, "position": position }),
            );
        }
        Commands::Stir { target, rate, off } => {
            match (target, off, rate) {
                (StirTarget::Wheel, true, _) => rig.stop_wheel_stirring()?,
                (StirTarget::Plate, true, _) => rig.stop_stirrer_plate()?,
                (StirTarget::Wheel, false, Some(v)) => rig.set_stir_rate(v)?,
                (StirTarget::Plate, false, Some(v)) => rig.set_stirrer_plate_rate(v)?,
                (StirTarget::Wheel, false, None) => rig.start_wheel_stirring()?,
                (StirTarget::Plate, false, None) => rig.start_stirrer_plate()?,
            }
            let target = match target {
                StirTarget::Wheel => "wheel",
                StirTarget::Plate => "plate",
            };
            let state = if off { "off" } else { "on" };
            emit(
                json_mode,
                format!("{target} stirring {state}"),
                json!({ "target": target, "state": state, "rate": rate }),
            );
        }
        Commands::Measure => {
            let reading = rig.measure_ph_calibrated()?;
            let human = match reading.ph {
                Some(ph) => format!("pH {ph:.2} (raw {:.3})", reading.raw),
                None => format!("raw {:.3} (no pH calibration)", reading.raw),
            };
            emit(json_mode, human, json!({ "raw": reading.raw, "ph": reading.ph }));
        }
        Commands::KillPhServer => {
            rig.kill_ph_server()?;
            emit(json_mode, "pH server told to exit", json!({ "killed": true }));
        }
        Commands::Calibrate => {
            let outcome = rig.calibrate(&mut StdinWeights)?;
            if json_mode {
                let rates: serde_json::Map<String, serde_json::Value> = outcome
                    .rates
                    .iter()
                    .map(|(p, r)| (p.clone(), json!(r)))
                    .collect();
                println!(
                    "{}",
                    json!({
                        "rates": rates,
                        "skipped": outcome.skipped,
                        "rejected": outcome.rejected,
                        "persisted": outcome.persisted,
                    })
                );
            } else {
                for (pump, rate) in &outcome.rates {
                    println!("{pump}: {rate:.4} per minute");
                }
                for pump in &outcome.skipped {
                    println!("{pump}: skipped (not on either board)");
                }
                for pump in &outcome.rejected {
                    println!("{pump}: rejected (non-positive rate)");
                }
                if !outcome.persisted {
                    println!("calibration NOT saved; rates apply to this session only");
                }
            }
        }
        Commands::RunPlan { plan, prime } => {
            let plan = load_plan_csv(&plan).wrap_err("load plan csv")?;
            if prime {
                rig.prime_pumps(&[])?;
            }
            let report = run_plan(&mut rig, &plan, &mut StdinOperator, cfg.plan.tray_positions)?;
            emit(
                json_mode,
                format!(
                    "plan complete: {} reactions, {} doses, {} tray changes",
                    report.reactions, report.doses, report.tray_changes
                ),
                json!({
                    "reactions": report.reactions,
                    "doses": report.doses,
                    "tray_changes": report.tray_changes,
                }),
            );
        }
        Commands::SelfCheck => {
            let missing = rig.missing_devices();
            let uncalibrated: Vec<String> =
                rig.uncalibrated_pumps().into_iter().map(str::to_string).collect();
            if json_mode {
                println!(
                    "{}",
                    json!({
                        "rig": rig.name(),
                        "missing": missing,
                        "uncalibrated": uncalibrated,
                    })
                );
            } else {
                println!("rig {}", rig.name());
                if !uncalibrated.is_empty() {
                    println!("uncalibrated pumps: {}", uncalibrated.join(", "));
                }
            }
            if !missing.is_empty() {
                eyre::bail!("self-check failed: no board carries {}", missing.join(", "));
            }
            if !json_mode {
                println!("OK");
            }
        }
        // served above, without the boards
        Commands::PhServer => {}
    }
    Ok(())
}

fn serve_ph(cfg: &Config, json_mode: bool) -> eyre::Result<()> {
    let server = MeasurementServer::bind(
        cfg.measurement.addr.as_str(),
        sim::acquisition(),
        SimulatedIndicator::default(),
        SimClock::from_env(),
        ServerOptions::from(&cfg.measurement),
    )
    .wrap_err_with(|| format!("bind pH server on {}", cfg.measurement.addr))?;
    let report = server.serve().wrap_err("pH server")?;
    emit(
        json_mode,
        format!("pH server stopped: {} replies, {} failures", report.replies, report.failures),
        json!({ "replies": report.replies, "failures": report.failures }),
    );
    Ok(())
}
