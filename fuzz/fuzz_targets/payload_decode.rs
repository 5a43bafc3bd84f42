//! Decrypted payload bodies come from the network; parsing must never panic.

#![no_main]

use cloakline_proto::{
    Envelope,
    payloads::{AuthResponse, OnlineUsersResponse, PublicKeyResponse, RelayedMessage},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<AuthResponse>(data);
    let _ = serde_json::from_slice::<OnlineUsersResponse>(data);
    let _ = serde_json::from_slice::<PublicKeyResponse>(data);
    let _ = serde_json::from_slice::<RelayedMessage>(data);

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(envelope) = Envelope::from_json(text) {
            assert!(!envelope.is_empty());
            assert_eq!(Envelope::from_json(&envelope.to_json()).ok(), Some(envelope));
        }
    }
});
