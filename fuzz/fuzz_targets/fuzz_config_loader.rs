#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<rig_config::Config>(data) {
        let _ = cfg.validate();
    }
    // The calibration file is plain JSON too.
    if let Ok(cal) = serde_json::from_str::<rig_config::PumpCalibration>(data) {
        for (pump, _) in cal.iter() {
            assert!(cal.rate(pump).is_none_or(|r| r.is_finite() && r > 0.0));
        }
    }
});
