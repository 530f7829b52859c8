//! Simulated backend wiring.
//!
//! The device catalog comes from `[boards]`. A few environment variables
//! steer the simulation for tests and bench demos:
//!
//! - `RIG_SIM_PH_MEAN`: raw value the simulated digitiser centres on (512.0)
//! - `RIG_SIM_DAQ`: `fail` or `timeout` to make every sampling run fail
//! - `RIG_SIM_CLOCK=manual`: virtual time, pump runs return immediately

use rig_config::BoardsCfg;
use rig_hardware::{AcquisitionMode, SimulatedAcquisition, SimulatedBoard};
use rig_traits::{Clock, ManualClock, MonotonicClock};
use std::time::{Duration, Instant};

pub fn boards(cfg: &BoardsCfg) -> (SimulatedBoard, SimulatedBoard) {
    (
        SimulatedBoard::new(cfg.main_name.clone(), cfg.main.iter().cloned()),
        SimulatedBoard::new(cfg.secondary_name.clone(), cfg.secondary.iter().cloned()),
    )
}

pub fn acquisition() -> SimulatedAcquisition {
    let mode = match std::env::var("RIG_SIM_DAQ").as_deref() {
        Ok("fail") => AcquisitionMode::Faulty,
        Ok("timeout") => AcquisitionMode::Timeout,
        _ => {
            let mean = std::env::var("RIG_SIM_PH_MEAN")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(512.0);
            AcquisitionMode::Steady { mean, spread: 1.5 }
        }
    };
    SimulatedAcquisition::new(mode)
}

/// Wall-clock or virtual time, picked once at startup.
#[derive(Debug, Clone)]
pub enum SimClock {
    Real(MonotonicClock),
    Manual(ManualClock),
}

impl SimClock {
    pub fn from_env() -> Self {
        if std::env::var("RIG_SIM_CLOCK").is_ok_and(|v| v.eq_ignore_ascii_case("manual")) {
            Self::Manual(ManualClock::new())
        } else {
            Self::Real(MonotonicClock::new())
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        match self {
            Self::Real(c) => c.now(),
            Self::Manual(c) => c.now(),
        }
    }

    fn sleep(&self, d: Duration) {
        match self {
            Self::Real(c) => c.sleep(d),
            Self::Manual(c) => c.sleep(d),
        }
    }
}
