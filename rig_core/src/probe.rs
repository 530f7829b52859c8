//! pH probe lift on the main board's modular driver.
//!
//! Positions are expressed as positive depths in `[0, travel_limit]`; 0 is
//! fully raised. On rigs where the driver counts downwards the target is
//! negated before it reaches the hardware. Raising always homes the driver
//! against its end stop rather than trusting the position counter.
use rig_traits::Board;

use crate::config::MotionParams;
use crate::error::{Result, RigError};
use crate::hw_error::hw;
use crate::router::device;

/// Move the probe to depth `position`. Out-of-range targets fail with
/// `TravelLimit` before anything moves.
pub fn move_probe(board: &mut dyn Board, motion: &MotionParams, position: i64) -> Result<()> {
    let limit = motion.probe_travel_limit;
    if !(0..=limit).contains(&position) {
        return Err(RigError::TravelLimit { position, limit });
    }
    let target = if motion.probe_inverted { -position } else { position };
    tracing::debug!(position, target, "probe move");
    device(board, &motion.probe_device)?
        .move_to(target)
        .map_err(hw)
}

/// Drive the probe back to its home switch.
pub fn home_probe(board: &mut dyn Board, motion: &MotionParams) -> Result<()> {
    tracing::debug!("probe home");
    device(board, &motion.probe_device)?.home().map_err(hw)
}

/// Keeps the probe accounted for while it is (or may be) lowered.
///
/// Created before the probe goes down; the probe is raised exactly once,
/// either by `release` or, on any early exit, by `Drop`.
pub struct ProbeGuard<'a> {
    board: &'a mut dyn Board,
    motion: &'a MotionParams,
    raised: bool,
}

impl<'a> ProbeGuard<'a> {
    pub fn new(board: &'a mut dyn Board, motion: &'a MotionParams) -> Self {
        Self {
            board,
            motion,
            raised: false,
        }
    }

    /// Lower to the bottom of travel.
    pub fn lower(&mut self) -> Result<()> {
        move_probe(&mut *self.board, self.motion, self.motion.probe_travel_limit)
    }

    /// Raise now and report the outcome.
    pub fn release(mut self) -> Result<()> {
        self.raise()
    }

    fn raise(&mut self) -> Result<()> {
        if self.raised {
            return Ok(());
        }
        self.raised = true;
        home_probe(&mut *self.board, self.motion)
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.raise() {
            tracing::error!(error = %e, "probe could not be raised");
        }
    }
}
