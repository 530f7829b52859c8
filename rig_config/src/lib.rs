#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and persisted rig state.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section has defaults matching the production rigs, so an empty
//!   file describes a working two-board rig.
//! - `calibration` holds the per-rig pump rate store (JSON).
//! - `ph` fits buffer readings to a raw -> pH line.
//! - `plan` loads the reaction sequence CSV.
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub mod atomic;
pub mod calibration;
pub mod ph;
pub mod plan;

pub use calibration::{CalibrationPersistError, CalibrationStore, PumpCalibration};
pub use ph::PhCalibration;
pub use plan::{Reaction, SynthesisPlan};

/// Pumps the production rigs calibrate and route (R8 is fitted but unused).
pub const DEFAULT_TRACKED_PUMPS: [&str; 7] = ["R1", "R2", "R3", "R4", "R5", "R6", "R7"];

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RigCfg {
    /// Rig instance name; selects the calibration files (e.g. "frodo", "sam").
    pub name: String,
    /// Directory holding `<name>.json` and `<name>_pH_calibrations.json`.
    pub calibration_dir: PathBuf,
    /// Pumps the calibration procedure walks and `is_calibrated` checks.
    pub tracked_pumps: Vec<String>,
}

impl Default for RigCfg {
    fn default() -> Self {
        Self {
            name: "frodo".into(),
            calibration_dir: PathBuf::from("calibrations"),
            tracked_pumps: DEFAULT_TRACKED_PUMPS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Device catalog per board, used by the simulated backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoardsCfg {
    pub main_name: String,
    pub main: Vec<String>,
    pub secondary_name: String,
    pub secondary: Vec<String>,
}

impl Default for BoardsCfg {
    fn default() -> Self {
        let names = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            main_name: "main".into(),
            main: names(&["wheel", "pH", "fans", "stirrer", "R1", "R2", "R3", "R4"]),
            secondary_name: "secondary".into(),
            secondary: names(&["R5", "R6", "R7", "R8"]),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotionCfg {
    pub wheel_device: String,
    pub probe_device: String,
    pub fans_device: String,
    pub stirrer_device: String,
    /// Steps for one wheel position.
    pub wheel_turn_steps: i64,
    /// Steps per pump actuation pulse.
    pub pump_increment_steps: i64,
    /// Pause between pump pulses in milliseconds.
    pub pulse_interval_ms: u64,
    /// Lowest probe position in steps; targets outside [0, limit] are rejected.
    pub probe_travel_limit: i64,
    /// The probe lift counts downwards as negative steps.
    pub probe_inverted: bool,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            wheel_device: "wheel".into(),
            probe_device: "pH".into(),
            fans_device: "fans".into(),
            stirrer_device: "stirrer".into(),
            wheel_turn_steps: 6400,
            pump_increment_steps: 8000,
            pulse_interval_ms: 10,
            probe_travel_limit: 39_000,
            probe_inverted: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Runs per pump; the rate is the mean of the per-run deltas.
    pub repetitions: u32,
    /// Reference run length per repetition (seconds).
    pub reference_secs: u64,
    /// Priming run length per pump (seconds).
    pub prime_secs: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            repetitions: 3,
            reference_secs: 60,
            prime_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MeasurementCfg {
    /// Address of the pH measurement server.
    pub addr: String,
    /// Client connect/read timeout (ms). Must cover the server's settle delay.
    pub timeout_ms: u64,
    /// Server-side settle delay between arming and reading back (ms).
    pub settle_ms: u64,
}

impl Default for MeasurementCfg {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9000".into(),
            timeout_ms: 10_000,
            settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Optional remote log host ("host:port").
    pub remote: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotifyCfg {
    pub platform: String,
    pub recipients: Vec<String>,
}

impl Default for NotifyCfg {
    fn default() -> Self {
        Self {
            platform: "Clusterbot".into(),
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlanCfg {
    /// Vials per tray; the operator swaps the tray every this many reactions.
    pub tray_positions: u32,
}

impl Default for PlanCfg {
    fn default() -> Self {
        Self { tray_positions: 24 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub rig: RigCfg,
    pub boards: BoardsCfg,
    pub motion: MotionCfg,
    pub calibration: CalibrationCfg,
    pub measurement: MeasurementCfg,
    pub logging: Logging,
    pub notify: NotifyCfg,
    pub plan: PlanCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Rig
        if self.rig.name.trim().is_empty() {
            eyre::bail!("rig.name must not be empty");
        }
        if self.rig.name.contains(['/', '\\']) {
            eyre::bail!("rig.name must not contain path separators");
        }
        if self.rig.tracked_pumps.is_empty() {
            eyre::bail!("rig.tracked_pumps must not be empty");
        }
        let mut seen = BTreeSet::new();
        for p in &self.rig.tracked_pumps {
            if !seen.insert(p.as_str()) {
                eyre::bail!("rig.tracked_pumps lists {p} twice");
            }
        }

        // Boards: a device may live on one board only
        let main: BTreeSet<&str> = self.boards.main.iter().map(String::as_str).collect();
        if let Some(dup) = self.boards.secondary.iter().find(|d| main.contains(d.as_str())) {
            eyre::bail!("boards: device {dup} is listed on both boards");
        }
        for dev in [&self.motion.wheel_device, &self.motion.probe_device] {
            if !main.contains(dev.as_str()) {
                eyre::bail!("boards.main must carry the {dev} device");
            }
        }

        // Motion
        if self.motion.wheel_turn_steps <= 0 {
            eyre::bail!("motion.wheel_turn_steps must be > 0");
        }
        if self.motion.pump_increment_steps <= 0 {
            eyre::bail!("motion.pump_increment_steps must be > 0");
        }
        if self.motion.pulse_interval_ms > 1_000 {
            eyre::bail!("motion.pulse_interval_ms is unreasonably large (>1s)");
        }
        if self.motion.probe_travel_limit <= 0 {
            eyre::bail!("motion.probe_travel_limit must be > 0");
        }

        // Calibration
        if self.calibration.repetitions == 0 {
            eyre::bail!("calibration.repetitions must be >= 1");
        }
        if self.calibration.reference_secs == 0 {
            eyre::bail!("calibration.reference_secs must be >= 1");
        }

        // Measurement
        if self.measurement.timeout_ms <= self.measurement.settle_ms {
            eyre::bail!("measurement.timeout_ms must exceed measurement.settle_ms");
        }
        if self.measurement.addr.parse::<std::net::SocketAddr>().is_err() {
            eyre::bail!(
                "measurement.addr must be an ip:port address, got {}",
                self.measurement.addr
            );
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Plan
        if self.plan.tray_positions == 0 {
            eyre::bail!("plan.tray_positions must be >= 1");
        }

        Ok(())
    }

    /// Calibration store rooted at `rig.calibration_dir`.
    pub fn calibration_store(&self) -> CalibrationStore {
        CalibrationStore::new(&self.rig.calibration_dir)
    }
}
