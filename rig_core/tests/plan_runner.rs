use rig_config::plan::parse_plan;
use rig_config::{CalibrationStore, PumpCalibration};
use rig_core::mocks::{PatientOperator, RecordingNotifier, ScriptedMeasurement};
use rig_core::{Notice, Operator, Rig, RigError, run_plan};
use rig_hardware::{Command, Journal, SimulatedBoard};
use rig_traits::{DynError, ManualClock};

fn assert_stirring_stopped(main: &Journal) {
    for device in ["fans", "stirrer"] {
        assert_eq!(
            main.for_device(device).last(),
            Some(&Command::Pwm { device: device.into(), value: 0 }),
            "{device} left running"
        );
    }
}

fn plan_rig(notifier: RecordingNotifier) -> (Rig, Journal, Journal, tempfile::TempDir) {
    plan_rig_with(notifier, &[])
}

fn plan_rig_with(
    notifier: RecordingNotifier,
    extra_rates: &[(&str, f64)],
) -> (Rig, Journal, Journal, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = CalibrationStore::new(dir.path());
    let cal: PumpCalibration = [("R1", 10.0), ("R3", 6.0), ("R5", 12.0)]
        .iter()
        .chain(extra_rates)
        .map(|(p, r)| (p.to_string(), *r))
        .collect();
    store.save("frodo", &cal).unwrap();
    let main = SimulatedBoard::new("frodo1", ["wheel", "pH", "fans", "stirrer", "R1", "R3"]);
    let secondary = SimulatedBoard::new("frodo2", ["R5"]);
    let (mj, sj) = (main.journal(), secondary.journal());
    let rig = Rig::builder("frodo")
        .with_boards(main, secondary)
        .with_store(store)
        .with_measurement(ScriptedMeasurement::default())
        .with_notifier(notifier)
        .with_clock(ManualClock::new())
        .build()
        .unwrap();
    (rig, mj, sj, dir)
}

const PLAN: &str = "\
reaction,R1,R3,R5
W200-001,0.5,0.1,
W200-002,0.5,,0.2
W200-003,,0.1,0.2
";

#[test]
fn runs_every_reaction_and_asks_for_a_fresh_tray() {
    let notifier = RecordingNotifier::default();
    let (mut rig, main, secondary, _dir) = plan_rig(notifier.clone());
    let plan = parse_plan(PLAN.as_bytes()).unwrap();
    let mut operator = PatientOperator::default();

    let report = run_plan(&mut rig, &plan, &mut operator, 2).unwrap();
    assert_eq!(report.reactions, 3);
    assert_eq!(report.doses, 6);
    assert_eq!(report.tray_changes, 1);
    assert_eq!(operator.acknowledged.len(), 1);
    assert!(operator.acknowledged[0].contains("W200-002"));

    assert_eq!(main.for_device("wheel").len(), 3);
    assert!(!secondary.for_device("R5").is_empty());
    // Stirring kicked, settled and both stirrers stopped at the end.
    assert_stirring_stopped(&main);

    let notices = notifier.notices();
    assert!(matches!(notices.first(), Some(Notice::TrayFull(_))));
    assert_eq!(
        notices.last(),
        Some(&Notice::Update("Reaction sequence finished!".into()))
    );
}

#[test]
fn wheel_turns_after_each_reactions_doses() {
    let (mut rig, main, _, _dir) = plan_rig(RecordingNotifier::default());
    let plan = parse_plan(PLAN.as_bytes()).unwrap();
    run_plan(&mut rig, &plan, &mut PatientOperator::default(), 24).unwrap();

    let order: Vec<String> = main
        .commands()
        .into_iter()
        .map(|c| c.device().to_string())
        .filter(|d| d == "wheel" || d == "R1" || d == "R3")
        .collect();
    let first_wheel = order.iter().position(|d| d == "wheel").unwrap();
    assert!(order[..first_wheel].iter().any(|d| d == "R1"));
    assert!(order[..first_wheel].iter().any(|d| d == "R3"));
}

#[test]
fn uncalibrated_pump_aborts_with_crash_notice() {
    let notifier = RecordingNotifier::default();
    let (mut rig, main, _, _dir) = plan_rig(notifier.clone());
    let plan = parse_plan("reaction,R1,R2\nA,1.0,\nB,,1.0\nC,1.0,\n".as_bytes()).unwrap();

    let err = run_plan(&mut rig, &plan, &mut PatientOperator::default(), 24).unwrap_err();
    assert_eq!(err, RigError::UncalibratedPump("R2".into()));
    // Refused before the first dose: nothing dispensed, the wheel never moved.
    assert!(main.for_device("R1").is_empty());
    assert!(main.for_device("wheel").is_empty());
    assert!(main.for_device("fans").is_empty());
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(&notices[0], Notice::Crash(m) if m.contains("R2")));
}

struct Absent;

impl Operator for Absent {
    fn acknowledge(&mut self, _prompt: &str) -> Result<(), DynError> {
        Err("stdin closed".into())
    }
}

#[test]
fn unacknowledged_tray_change_cancels() {
    let (mut rig, main, _, _dir) = plan_rig(RecordingNotifier::default());
    let plan = parse_plan(PLAN.as_bytes()).unwrap();
    let err = run_plan(&mut rig, &plan, &mut Absent, 1).unwrap_err();
    assert_eq!(err, RigError::Cancelled);
    assert!(main.for_device("R1").is_empty());
    assert_stirring_stopped(&main);
}

#[test]
fn pump_failure_mid_plan_still_stops_stirring() {
    let notifier = RecordingNotifier::default();
    // R7 has a rate but neither board carries it.
    let (mut rig, main, _, _dir) = plan_rig_with(notifier.clone(), &[("R7", 5.0)]);
    let plan = parse_plan("reaction,R1,R7\nA,1.0,\nB,,1.0\n".as_bytes()).unwrap();

    let err = run_plan(&mut rig, &plan, &mut PatientOperator::default(), 24).unwrap_err();
    assert_eq!(err, RigError::UnknownPump("R7".into()));
    assert_eq!(main.for_device("wheel").len(), 1);
    assert_stirring_stopped(&main);
    assert!(matches!(notifier.notices().last(), Some(Notice::Crash(_))));
}
