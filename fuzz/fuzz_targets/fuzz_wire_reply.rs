#![no_main]
use libfuzzer_sys::fuzz_target;
use rig_core::measurement::{REPLY_BUDGET, Request, decode_reply, encode_reply};

fuzz_target!(|data: &[u8]| {
    let _ = Request::parse(data);
    if let Ok(v) = decode_reply(data) {
        assert!(v.is_finite());
        // Anything we accept, we can send back within the budget.
        if let Ok(s) = encode_reply(v) {
            assert!(s.len() <= REPLY_BUDGET);
        }
    }
});
