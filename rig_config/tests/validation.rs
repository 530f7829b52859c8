use rig_config::load_toml;

#[test]
fn empty_file_is_a_valid_default_rig() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults validate");
    assert_eq!(cfg.rig.name, "frodo");
    assert_eq!(cfg.rig.tracked_pumps.len(), 7);
    assert_eq!(cfg.motion.wheel_turn_steps, 6400);
    assert_eq!(cfg.motion.pump_increment_steps, 8000);
    assert_eq!(cfg.calibration.repetitions, 3);
    assert_eq!(cfg.calibration.reference_secs, 60);
    assert_eq!(cfg.measurement.addr, "127.0.0.1:9000");
    assert_eq!(cfg.plan.tray_positions, 24);
}

#[test]
fn parses_full_rig() {
    let toml = r#"
[rig]
name = "sam"
calibration_dir = "/var/lib/rig"
tracked_pumps = ["R1", "R5"]

[boards]
main_name = "sam1"
main = ["wheel", "pH", "R1"]
secondary_name = "sam2"
secondary = ["R5"]

[motion]
pulse_interval_ms = 5
probe_travel_limit = 20000

[measurement]
addr = "10.0.0.7:9000"
timeout_ms = 5000
settle_ms = 1000

[logging]
level = "debug"
rotation = "daily"
remote = "10.0.0.2:9000"

[notify]
recipients = ["lab@example.org"]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.boards.main_name, "sam1");
    assert_eq!(cfg.boards.secondary, vec!["R5".to_string()]);
    assert_eq!(cfg.motion.probe_travel_limit, 20_000);
    assert!(cfg.motion.probe_inverted);
    assert_eq!(cfg.logging.remote.as_deref(), Some("10.0.0.2:9000"));
    assert_eq!(
        cfg.calibration_store().path_for("sam"),
        std::path::Path::new("/var/lib/rig/sam.json")
    );
}

#[test]
fn rejects_device_on_both_boards() {
    let toml = r#"
[boards]
main = ["wheel", "pH", "R1"]
secondary = ["R1", "R2"]
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("R1 on both boards");
    assert!(format!("{err}").contains("R1 is listed on both boards"));
}

#[test]
fn rejects_timeout_shorter_than_settle() {
    let toml = r#"
[measurement]
timeout_ms = 500
settle_ms = 1000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("timeout below settle");
    assert!(format!("{err}").contains("timeout_ms must exceed"));
}

#[test]
fn rejects_zero_repetitions_and_bad_rotation() {
    let cfg = load_toml("[calibration]\nrepetitions = 0\n").unwrap();
    assert!(cfg.validate().is_err());

    let cfg = load_toml("[logging]\nrotation = \"weekly\"\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err}").contains("never|daily|hourly"));
}

#[test]
fn rejects_missing_wheel_on_main() {
    let cfg = load_toml("[boards]\nmain = [\"pH\", \"R1\"]\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err}").contains("wheel"));
}

#[test]
fn rejects_empty_tracked_pumps() {
    let cfg = load_toml("[rig]\ntracked_pumps = []\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err}").contains("rig.tracked_pumps must not be empty"));
}
