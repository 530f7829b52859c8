use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use rig_config::{CalibrationStore, PhCalibration};
use rig_core::measurement::{ServeReport, ServerOptions};
use rig_core::mocks::ScriptedMeasurement;
use rig_core::{MeasurementClient, MeasurementServer, Rig, RigError};
use rig_hardware::{AcquisitionMode, Command, Journal, SimulatedAcquisition, SimulatedBoard, SimulatedIndicator};
use rig_traits::ManualClock;

const TIMEOUT: Duration = Duration::from_secs(5);

fn spawn_server(mode: AcquisitionMode) -> (SocketAddr, SimulatedIndicator, JoinHandle<ServeReport>) {
    let indicator = SimulatedIndicator::default();
    let server = MeasurementServer::bind(
        "127.0.0.1:0",
        SimulatedAcquisition::new(mode).with_samples(1000),
        indicator.clone(),
        ManualClock::new(),
        ServerOptions {
            settle: Duration::from_millis(1000),
            read_timeout: TIMEOUT,
        },
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    let handle = std::thread::spawn(move || server.serve().unwrap());
    (addr, indicator, handle)
}

#[test]
fn steady_probe_reports_its_mean() {
    let (addr, indicator, handle) = spawn_server(AcquisitionMode::Steady {
        mean: 512.0,
        spread: 1.2,
    });
    let client = MeasurementClient::new(addr, TIMEOUT);
    assert_eq!(client.request_measurement().unwrap(), 512.0);
    assert_eq!(client.request_measurement().unwrap(), 512.0);
    client.request_shutdown().unwrap();

    let report = handle.join().unwrap();
    assert_eq!(report, ServeReport { replies: 2, failures: 0 });
    let history = indicator.history();
    assert_eq!(history.first(), Some(&(255, 0, 0)));
    assert!(history.contains(&(0, 0, 255)));
    assert_eq!(indicator.last(), Some((255, 0, 0)));
}

#[test]
fn kill_gets_no_reply() {
    let (addr, _, handle) = spawn_server(AcquisitionMode::Steady { mean: 1.0, spread: 0.0 });
    let mut raw = TcpStream::connect(addr).unwrap();
    raw.write_all(b"KILL").unwrap();
    raw.shutdown(Shutdown::Write).unwrap();
    raw.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut reply = Vec::new();
    raw.read_to_end(&mut reply).unwrap();
    assert!(reply.is_empty());
    assert_eq!(handle.join().unwrap(), ServeReport::default());
}

#[test]
fn kill_split_across_writes_still_stops_the_server() {
    let (addr, _, handle) = spawn_server(AcquisitionMode::Steady { mean: 1.0, spread: 0.0 });
    let mut raw = TcpStream::connect(addr).unwrap();
    raw.set_nodelay(true).unwrap();
    raw.write_all(b"KI").unwrap();
    raw.flush().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    raw.write_all(b"LL").unwrap();
    raw.shutdown(Shutdown::Write).unwrap();
    raw.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut reply = Vec::new();
    raw.read_to_end(&mut reply).unwrap();
    assert!(reply.is_empty());
    assert_eq!(handle.join().unwrap(), ServeReport::default());
}

#[test]
fn listener_is_closed_once_killed() {
    let (addr, indicator, handle) = spawn_server(AcquisitionMode::Steady { mean: 1.0, spread: 0.0 });
    MeasurementClient::new(addr, TIMEOUT).request_shutdown().unwrap();
    handle.join().unwrap();
    assert_eq!(indicator.last(), Some((255, 0, 0)));
    assert!(TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_err());
}

#[test]
fn sampling_failure_closes_without_reply_and_keeps_listening() {
    let (addr, indicator, handle) = spawn_server(AcquisitionMode::Faulty);
    let client = MeasurementClient::new(addr, TIMEOUT);

    let err = client.request_measurement().unwrap_err();
    assert_eq!(err, RigError::MeasurementFailed("empty reply".into()));
    // Still serving after the failure.
    assert!(matches!(
        client.request_measurement(),
        Err(RigError::MeasurementFailed(_))
    ));
    assert!(indicator.history().windows(2).any(|w| w == [(0, 0, 255), (255, 0, 0)]));

    client.request_shutdown().unwrap();
    assert_eq!(handle.join().unwrap(), ServeReport { replies: 0, failures: 2 });
}

#[test]
fn acquisition_timeout_is_a_failed_measurement() {
    let (addr, _, handle) = spawn_server(AcquisitionMode::Timeout);
    let client = MeasurementClient::new(addr, TIMEOUT);
    assert!(matches!(
        client.request_measurement(),
        Err(RigError::MeasurementFailed(_))
    ));
    client.request_shutdown().unwrap();
    handle.join().unwrap();
}

#[test]
fn nobody_listening_is_a_failed_measurement() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = MeasurementClient::new(addr, Duration::from_millis(500));
    assert!(matches!(
        client.request_measurement(),
        Err(RigError::MeasurementFailed(_))
    ));
}

fn probe_rig(source: impl rig_core::MeasurementSource + Send + 'static, ph: Option<PhCalibration>) -> (Rig, Journal, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let main = SimulatedBoard::new("frodo1", ["wheel", "pH"]);
    let journal = main.journal();
    let rig = Rig::builder("frodo")
        .with_boards(main, SimulatedBoard::new("frodo2", ["R5"]))
        .with_store(CalibrationStore::new(dir.path()))
        .with_measurement(source)
        .with_ph_calibration(ph)
        .with_clock(ManualClock::new())
        .build()
        .unwrap();
    (rig, journal, dir)
}

fn homes(journal: &Journal) -> usize {
    journal
        .for_device("pH")
        .iter()
        .filter(|c| matches!(c, Command::Home { .. }))
        .count()
}

#[test]
fn measure_ph_over_loopback_lowers_then_raises_once() {
    let (addr, _, handle) = spawn_server(AcquisitionMode::Steady {
        mean: 512.0,
        spread: 1.2,
    });
    let (mut rig, journal, _dir) = probe_rig(MeasurementClient::new(addr, TIMEOUT), None);

    assert_eq!(rig.measure_ph().unwrap(), 512.0);
    assert_eq!(
        journal.for_device("pH"),
        vec![
            Command::MoveTo { device: "pH".into(), position: -39_000 },
            Command::Home { device: "pH".into() },
        ]
    );

    rig.kill_ph_server().unwrap();
    assert_eq!(handle.join().unwrap().replies, 1);
}

#[test]
fn failed_measurement_still_raises_once() {
    let scripted = ScriptedMeasurement::new([Err(RigError::MeasurementFailed("timed out".into()))]);
    let (mut rig, journal, _dir) = probe_rig(scripted, None);
    assert_eq!(
        rig.measure_ph().unwrap_err(),
        RigError::MeasurementFailed("timed out".into())
    );
    assert_eq!(homes(&journal), 1);
}

#[test]
fn calibrated_reading_converts_raw() {
    let cal = PhCalibration { slope: -0.03, intercept: 22.36 };
    let scripted = ScriptedMeasurement::new([Ok(512.0), Ok(400.0)]);
    let (mut rig, _, _dir) = probe_rig(scripted, Some(cal));
    let reading = rig.measure_ph_calibrated().unwrap();
    assert_eq!(reading.raw, 512.0);
    assert!((reading.ph.unwrap() - 7.0).abs() < 1e-9);

    let (mut rig, journal, _dir) = probe_rig(ScriptedMeasurement::new([Ok(400.0)]), None);
    let reading = rig.measure_ph_calibrated().unwrap();
    assert_eq!(reading.ph, None);
    assert_eq!(homes(&journal), 1);
}

#[test]
fn kill_is_forwarded_to_the_source() {
    let scripted = ScriptedMeasurement::default();
    let (mut rig, _, _dir) = probe_rig(scripted.clone(), None);
    rig.kill_ph_server().unwrap();
    assert_eq!(scripted.shutdowns(), 1);
}
