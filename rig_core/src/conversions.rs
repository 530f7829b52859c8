//! `From` implementations bridging `rig_config` types to `rig_core` types.

use crate::config::{CalibrationParams, MotionParams};
use std::time::Duration;

impl From<&rig_config::MotionCfg> for MotionParams {
    fn from(c: &rig_config::MotionCfg) -> Self {
        Self {
            wheel_device: c.wheel_device.clone(),
            probe_device: c.probe_device.clone(),
            fans_device: c.fans_device.clone(),
            stirrer_device: c.stirrer_device.clone(),
            wheel_turn_steps: c.wheel_turn_steps,
            pump_increment_steps: c.pump_increment_steps,
            pulse_interval: Duration::from_millis(c.pulse_interval_ms),
            probe_travel_limit: c.probe_travel_limit,
            probe_inverted: c.probe_inverted,
        }
    }
}

impl From<&rig_config::Config> for CalibrationParams {
    fn from(c: &rig_config::Config) -> Self {
        Self {
            tracked_pumps: c.rig.tracked_pumps.clone(),
            repetitions: c.calibration.repetitions,
            reference: Duration::from_secs(c.calibration.reference_secs),
            prime: Duration::from_secs(c.calibration.prime_secs),
        }
    }
}
