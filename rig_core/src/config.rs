//! Runtime parameters for the rig.
//!
//! These are the plain structs the core runs on. They are separate from the
//! TOML-deserialized config in `rig_config`; see `conversions`.

use std::time::Duration;

/// Device names and step geometry.
#[derive(Debug, Clone)]
pub struct MotionParams {
    pub wheel_device: String,
    pub probe_device: String,
    pub fans_device: String,
    pub stirrer_device: String,
    /// Steps per wheel position.
    pub wheel_turn_steps: i64,
    /// Steps per pump pulse.
    pub pump_increment_steps: i64,
    /// Pause between pump pulses.
    pub pulse_interval: Duration,
    /// Lowest probe position (steps, positive).
    pub probe_travel_limit: i64,
    /// Drive the probe with negative targets.
    pub probe_inverted: bool,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            wheel_device: "wheel".into(),
            probe_device: "pH".into(),
            fans_device: "fans".into(),
            stirrer_device: "stirrer".into(),
            wheel_turn_steps: 6400,
            pump_increment_steps: 8000,
            pulse_interval: Duration::from_millis(10),
            probe_travel_limit: 39_000,
            probe_inverted: true,
        }
    }
}

/// Pump calibration procedure settings.
#[derive(Debug, Clone)]
pub struct CalibrationParams {
    pub tracked_pumps: Vec<String>,
    pub repetitions: u32,
    /// Run length per repetition; rates are volume per minute, so 60 s keeps
    /// the weight delta equal to the rate.
    pub reference: Duration,
    pub prime: Duration,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            tracked_pumps: rig_config::DEFAULT_TRACKED_PUMPS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            repetitions: 3,
            reference: Duration::from_secs(60),
            prime: Duration::from_secs(30),
        }
    }
}
