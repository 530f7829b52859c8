use rig_hardware::{AcquisitionMode, Command, HwError, SimulatedAcquisition, SimulatedBoard, SimulatedIndicator};
use rig_traits::{Acquisition, Board, Indicator};
use rstest::rstest;

#[test]
fn journal_is_shared_across_handles() {
    let mut board = SimulatedBoard::new("frodo1", ["R1", "fans"]);
    let journal = board.journal();
    board.device("R1").unwrap().set_current_position(0).unwrap();
    board.device("R1").unwrap().move_to(8000).unwrap();
    board.device("fans").unwrap().set_pwm(250).unwrap();

    assert_eq!(journal.for_device("R1").len(), 2);
    assert_eq!(
        journal.for_device("fans"),
        vec![Command::Pwm { device: "fans".into(), value: 250 }]
    );
    assert_eq!(board.actuator("R1").unwrap().position(), 8000);
    assert_eq!(board.actuator("fans").unwrap().pwm(), 250);

    journal.clear();
    assert!(board.journal().is_empty());
}

#[rstest]
#[case(AcquisitionMode::Faulty, "acquisition fault")]
#[case(AcquisitionMode::Timeout, "timeout")]
fn failing_modes_report_on_read(#[case] mode: AcquisitionMode, #[case] needle: &str) {
    let mut daq = SimulatedAcquisition::new(mode);
    daq.run_single_shot().unwrap();
    assert!(daq.sampling_done().unwrap());
    let err = daq.read_samples().unwrap_err();
    assert!(err.to_string().contains(needle), "{err}");
    assert!(err.downcast_ref::<HwError>().is_some());
    assert_eq!(daq.runs(), 0);
}

#[test]
fn default_run_length_matches_production_digitiser() {
    let mut daq = SimulatedAcquisition::new(AcquisitionMode::Steady { mean: 7.0, spread: 0.0 });
    daq.run_single_shot().unwrap();
    assert_eq!(daq.read_samples().unwrap().len(), SimulatedAcquisition::DEFAULT_SAMPLES);
}

#[test]
fn indicator_clones_see_the_same_history() {
    let indicator = SimulatedIndicator::default();
    let mut handle = indicator.clone();
    handle.set_indicator(255, 0, 0).unwrap();
    handle.set_indicator(0, 255, 0).unwrap();
    assert_eq!(indicator.history(), vec![(255, 0, 0), (0, 255, 0)]);
    assert_eq!(indicator.last(), Some((0, 255, 0)));
}
