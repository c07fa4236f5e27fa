#![no_main]

use libfuzzer_sys::fuzz_target;
use quire_core::submit::{SubmitRequest, validate};

fuzz_target!(|data: &[u8]| {
    let Ok(req) = serde_json::from_slice::<SubmitRequest>(data) else {
        return;
    };
    if let Ok(fields) = validate(&req) {
        assert!(!fields.author_name.trim().is_empty());
        assert!(!fields.content.trim().is_empty());
        assert!(!fields.content.contains('\r'));
    }
});
