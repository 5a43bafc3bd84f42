//! Arbitrary text frames must decode or fail cleanly, and anything that
//! decodes must re-encode to an equal event.

#![no_main]

use cloakline_proto::WireEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(event) = WireEvent::from_json(text) {
        let encoded = event.to_json().expect("decoded event re-encodes");
        let decoded = WireEvent::from_json(&encoded).expect("re-encoded event decodes");
        assert_eq!(event, decoded);
        let _ = event.event.is_encrypted();
    }
});
