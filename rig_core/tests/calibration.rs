use std::time::Duration;

use rig_config::CalibrationStore;
use rig_core::mocks::{FixedWeights, ScriptedMeasurement};
use rig_core::{CalibrationParams, Rig, RigError};
use rig_hardware::{Command, Journal, SimulatedBoard};
use rig_traits::ManualClock;

fn rig_with(store: CalibrationStore, tracked: &[&str], reps: u32) -> (Rig, Journal) {
    let main = SimulatedBoard::new("frodo1", ["wheel", "pH", "R1", "R2"]);
    let journal = main.journal();
    let rig = Rig::builder("frodo")
        .with_boards(main, SimulatedBoard::new("frodo2", ["R5"]))
        .with_store(store)
        .with_measurement(ScriptedMeasurement::default())
        .with_clock(ManualClock::new())
        .with_calibration_params(CalibrationParams {
            tracked_pumps: tracked.iter().map(|s| s.to_string()).collect(),
            repetitions: reps,
            reference: Duration::from_secs(60),
            prime: Duration::from_secs(30),
        })
        .build()
        .unwrap();
    (rig, journal)
}

#[test]
fn averages_rounded_deltas_and_persists_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = CalibrationStore::new(dir.path());
    let (mut rig, journal) = rig_with(store.clone(), &["R1", "R9", "R5"], 3);

    // R1: deltas 10.0, 10.2, 9.8; R9 is skipped; R5: 5.00004 rounds to 5.0
    let mut weights = FixedWeights::new([
        0.0, 10.0, 10.0, 20.2, 20.2, 30.0, //
        1.0, 6.00004, 1.0, 6.00004, 1.0, 6.00004,
    ]);
    let outcome = rig.calibrate(&mut weights).unwrap();

    assert_eq!(outcome.skipped, vec!["R9".to_string()]);
    assert!(outcome.rejected.is_empty());
    assert!(outcome.persisted);
    assert_eq!(weights.prompts().len(), 12);
    assert!(weights.prompts()[0].starts_with("R1 weight before (1/3)"));

    let r1 = rig.calibration().rate("R1").unwrap();
    let r5 = rig.calibration().rate("R5").unwrap();
    assert!((r1 - 10.0).abs() < 1e-9, "{r1}");
    assert!((r5 - 5.0).abs() < 1e-9, "{r5}");
    assert!(rig.calibration().rate("R9").is_none());

    // One wheel turn per repetition, each after the pump run.
    assert_eq!(journal.for_device("wheel").len(), 6);
    let cmds = journal.commands();
    let first_turn = cmds.iter().position(|c| c.device() == "wheel").unwrap();
    assert_eq!(first_turn, 6000);

    let reloaded = store.load("frodo");
    assert_eq!(&reloaded, rig.calibration());
}

#[test]
fn non_positive_rates_are_not_stored() {
    let dir = tempfile::tempdir().unwrap();
    let (mut rig, _) = rig_with(CalibrationStore::new(dir.path()), &["R1", "R2"], 1);
    let mut weights = FixedWeights::new([5.0, 5.0, 5.0, 7.5]);
    let outcome = rig.calibrate(&mut weights).unwrap();
    assert_eq!(outcome.rejected, vec!["R1".to_string()]);
    assert_eq!(outcome.rates, vec![("R2".to_string(), 2.5)]);
    assert!(!rig.is_calibrated());
    assert_eq!(rig.uncalibrated_pumps(), vec!["R1"]);
}

#[test]
fn persist_failure_keeps_rates_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the calibration directory should be.
    let blocker = dir.path().join("calibrations");
    std::fs::write(&blocker, b"not a dir").unwrap();
    let (mut rig, _) = rig_with(CalibrationStore::new(&blocker), &["R1"], 1);

    let outcome = rig.calibrate(&mut FixedWeights::new([0.0, 10.0])).unwrap();
    assert!(!outcome.persisted);
    assert!(rig.is_calibrated());
    let report = rig.dispense("R1", 5.0).unwrap();
    assert_eq!(report.planned, Duration::from_secs(30));
}

#[test]
fn interrupted_pass_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = CalibrationStore::new(dir.path());
    let (mut rig, _) = rig_with(store.clone(), &["R1", "R2"], 1);

    // Weights run out during R2.
    let err = rig.calibrate(&mut FixedWeights::new([0.0, 10.0, 0.0])).unwrap_err();
    assert!(matches!(err, RigError::Hardware(ref m) if m.contains("weight input")));
    assert!(!store.path_for("frodo").exists());
    assert!(store.load("frodo").is_empty());
}

#[test]
fn pump_runs_use_relative_pulses() {
    let dir = tempfile::tempdir().unwrap();
    let (mut rig, journal) = rig_with(CalibrationStore::new(dir.path()), &["R2"], 1);
    rig.calibrate(&mut FixedWeights::new([0.0, 9.0])).unwrap();
    let pulses = journal.for_device("R2");
    assert_eq!(pulses.len(), 6000);
    assert!(pulses
        .iter()
        .all(|c| *c == Command::MoveBy { device: "R2".into(), steps: 8000 }));
}

#[test]
fn rig_without_tracked_pumps_or_rates_is_not_calibrated() {
    let dir = tempfile::tempdir().unwrap();
    let (rig, _) = rig_with(CalibrationStore::new(dir.path()), &[], 1);
    assert!(rig.calibration().is_empty());
    assert!(!rig.is_calibrated());
}
