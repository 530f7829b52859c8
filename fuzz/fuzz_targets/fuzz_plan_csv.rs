#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(plan) = rig_config::plan::parse_plan(data) {
        for r in &plan.reactions {
            assert!(!r.code.is_empty());
            assert!(r.doses.iter().all(|(_, v)| v.is_finite() && *v > 0.0));
        }
    }
});
