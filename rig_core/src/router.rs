//! Pump routing and duration-based actuation.
//!
//! A pump lives on exactly one of two boards. `Boards::resolve` asks the
//! main board first, then the secondary, so a device wired to both (a config
//! error `rig_config` rejects) still routes to a single board.
//!
//! The pumps are steppers that only understand relative steps, so "run for
//! N seconds" is a train of fixed-size pulses until a deadline, and "dispense
//! V" is the same train with the deadline derived from the calibrated rate.
use std::sync::Arc;
use std::time::{Duration, Instant};

use rig_traits::{Actuator, Board, Clock};

use crate::cancel::CancelToken;
use crate::error::{Result, RigError};
use crate::hw_error::hw;

/// Shortest pause between pulses; keeps the loop from spinning when a
/// driver returns immediately.
pub const MIN_PULSE_GAP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardId {
    Main,
    Secondary,
}

impl std::fmt::Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardId::Main => f.write_str("main"),
            BoardId::Secondary => f.write_str("secondary"),
        }
    }
}

/// The two controller boards of a rig.
pub struct Boards {
    main: Box<dyn Board + Send>,
    secondary: Box<dyn Board + Send>,
}

impl core::fmt::Debug for Boards {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Boards")
            .field("main", &self.main.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

impl Boards {
    pub fn new(main: Box<dyn Board + Send>, secondary: Box<dyn Board + Send>) -> Self {
        Self { main, secondary }
    }

    /// Board owning `pump`, main first.
    pub fn resolve(&self, pump: &str) -> Result<BoardId> {
        if self.main.has_device(pump) {
            Ok(BoardId::Main)
        } else if self.secondary.has_device(pump) {
            Ok(BoardId::Secondary)
        } else {
            Err(RigError::UnknownPump(pump.to_string()))
        }
    }

    pub fn get_mut(&mut self, id: BoardId) -> &mut dyn Board {
        match id {
            BoardId::Main => self.main.as_mut(),
            BoardId::Secondary => self.secondary.as_mut(),
        }
    }

    pub fn main_mut(&mut self) -> &mut dyn Board {
        self.main.as_mut()
    }

    pub fn name(&self, id: BoardId) -> &str {
        match id {
            BoardId::Main => self.main.name(),
            BoardId::Secondary => self.secondary.name(),
        }
    }
}

/// Look up `device` on `board` or fail with `UnknownDevice`.
pub fn device<'a>(board: &'a mut dyn Board, device: &str) -> Result<&'a mut dyn Actuator> {
    let board_name = board.name().to_string();
    board
        .device(device)
        .ok_or_else(|| RigError::UnknownDevice {
            board: board_name,
            device: device.to_string(),
        })
}

/// Seconds of pumping needed for `volume` at `rate_per_min` (volume/minute):
/// `volume / (rate / 60)`.
pub fn run_time_for_volume(volume: f64, rate_per_min: f64) -> Result<Duration> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(RigError::InvalidVolume(volume));
    }
    if !rate_per_min.is_finite() || rate_per_min <= 0.0 {
        return Err(RigError::Config(format!(
            "dispense rate must be > 0, got {rate_per_min}"
        )));
    }
    let secs = volume / (rate_per_min / 60.0);
    Duration::try_from_secs_f64(secs).map_err(|_| RigError::InvalidVolume(volume))
}

/// Outcome of one pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub planned: Duration,
    pub elapsed: Duration,
    pub pulses: u64,
}

/// Shared pulse-train settings: clock, step size, gap and stop flag.
#[derive(Clone)]
pub struct PulseTrain {
    clock: Arc<dyn Clock + Send + Sync>,
    increment: i64,
    gap: Duration,
    cancel: CancelToken,
}

impl core::fmt::Debug for PulseTrain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseTrain")
            .field("increment", &self.increment)
            .field("gap", &self.gap)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl PulseTrain {
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        increment: i64,
        gap: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            clock,
            increment,
            gap: gap.max(MIN_PULSE_GAP),
            cancel,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Call `pulse` repeatedly until `duration` of clock time has passed.
    /// The stop flag is checked before every pulse.
    fn drive(
        &self,
        duration: Duration,
        mut pulse: impl FnMut() -> Result<()>,
    ) -> Result<RunReport> {
        let start: Instant = self.clock.now();
        let deadline = start + duration;
        let mut pulses = 0u64;
        while self.clock.now() < deadline {
            if self.cancel.is_cancelled() {
                tracing::warn!(pulses, "pulse train cancelled");
                return Err(RigError::Cancelled);
            }
            pulse()?;
            pulses += 1;
            self.clock.sleep(self.gap);
        }
        Ok(RunReport {
            planned: duration,
            elapsed: self.clock.since(start),
            pulses,
        })
    }

    /// Run `pump` for `duration` with relative pulses.
    pub fn run_by_time(
        &self,
        board: &mut dyn Board,
        pump: &str,
        duration: Duration,
    ) -> Result<RunReport> {
        let increment = self.increment;
        let dev = device(board, pump)?;
        tracing::debug!(pump, secs = duration.as_secs_f64(), "run by time");
        self.drive(duration, || dev.move_by(increment).map_err(hw))
    }

    /// Dispense `volume` from `pump` at `rate_per_min`.
    ///
    /// The position counter is zeroed before the run and after every pulse,
    /// so each pulse is an absolute move to `increment` from a fresh origin
    /// and encoder drift never accumulates.
    pub fn run_by_volume(
        &self,
        board: &mut dyn Board,
        pump: &str,
        volume: f64,
        rate_per_min: f64,
    ) -> Result<RunReport> {
        let duration = run_time_for_volume(volume, rate_per_min)?;
        let increment = self.increment;
        let dev = device(board, pump)?;
        tracing::debug!(pump, volume, rate_per_min, secs = duration.as_secs_f64(), "run by volume");
        dev.set_current_position(0).map_err(hw)?;
        self.drive(duration, || {
            dev.move_to(increment).map_err(hw)?;
            dev.set_current_position(0).map_err(hw)
        })
    }
}
