//! Running a synthesis plan reaction by reaction.
//!
//! Each reaction dispenses its volumes in column order into the vial under
//! the outlet, then the wheel moves on one position. The tray holds
//! `tray_positions` vials; before the reaction that would need a fresh tray
//! the operator is told and must acknowledge before anything else moves.
use rig_config::SynthesisPlan;
use rig_traits::DynError;

use crate::error::{Result, RigError};
use crate::notify::Notice;
use crate::rig::Rig;

/// Whoever swaps vial trays.
pub trait Operator {
    /// Block until the operator confirms `prompt`. An error aborts the run.
    fn acknowledge(&mut self, prompt: &str) -> std::result::Result<(), DynError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanReport {
    pub reactions: usize,
    pub doses: usize,
    pub tray_changes: usize,
}

/// Run every reaction of `plan`, stirring throughout.
///
/// Every dosed pump must have a rate before anything moves. A failing
/// reaction sends a crash notice and returns its error; the completion
/// notice is only sent when every reaction ran. Stirring is stopped on
/// every exit once it has started.
pub fn run_plan(
    rig: &mut Rig,
    plan: &SynthesisPlan,
    operator: &mut dyn Operator,
    tray_positions: u32,
) -> Result<PlanReport> {
    if tray_positions == 0 {
        return Err(RigError::Config("tray_positions must be > 0".into()));
    }
    tracing::info!(reactions = plan.len(), pumps = ?plan.pumps, "starting plan");
    let result = match preflight(rig, plan) {
        Ok(()) => {
            let result = execute(rig, plan, operator, tray_positions);
            halt_stirring(rig);
            result
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(report) => {
            rig.notify(Notice::Update("Reaction sequence finished!".into()));
            tracing::info!(?report, "plan finished");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "plan aborted");
            rig.notify(Notice::Crash(format!("Reaction sequence aborted: {e}")));
            Err(e)
        }
    }
}

/// First dosed pump, in plan order, that has no usable rate.
fn preflight(rig: &Rig, plan: &SynthesisPlan) -> Result<()> {
    let calibration = rig.calibration();
    let uncalibrated = plan
        .reactions
        .iter()
        .flat_map(|r| r.doses.iter().map(|(pump, _)| pump.as_str()))
        .find(|pump| calibration.rate(pump).is_none());
    match uncalibrated {
        Some(pump) => Err(RigError::UncalibratedPump(pump.to_string())),
        None => Ok(()),
    }
}

fn halt_stirring(rig: &mut Rig) {
    if let Err(e) = rig.stop_wheel_stirring() {
        tracing::warn!(error = %e, "wheel stirrers not stopped");
    }
    if let Err(e) = rig.stop_stirrer_plate() {
        tracing::warn!(error = %e, "stirrer plate not stopped");
    }
}

fn execute(
    rig: &mut Rig,
    plan: &SynthesisPlan,
    operator: &mut dyn Operator,
    tray_positions: u32,
) -> Result<PlanReport> {
    let mut report = PlanReport::default();
    rig.start_wheel_stirring()?;
    rig.start_stirrer_plate()?;

    for (idx, reaction) in plan.reactions.iter().enumerate() {
        let number = idx + 1;
        if number % tray_positions as usize == 0 {
            tracing::info!(reaction = %reaction.code, "vial tray full");
            rig.notify(Notice::TrayFull(format!(
                "Finished {}!\nGo replace the vials before reaction {}.",
                number - 1,
                reaction.code
            )));
            operator
                .acknowledge(&format!(
                    "Reaction {} about to start, time to change out vials! Enter to continue",
                    reaction.code
                ))
                .map_err(|e| {
                    tracing::warn!(error = %e, "operator did not acknowledge tray change");
                    RigError::Cancelled
                })?;
            report.tray_changes += 1;
        }

        tracing::info!(reaction = %reaction.code, number, "reaction");
        for (pump, volume) in &reaction.doses {
            rig.dispense(pump, *volume)?;
            report.doses += 1;
        }
        rig.turn_wheel(1)?;
        report.reactions += 1;
    }

    Ok(report)
}
