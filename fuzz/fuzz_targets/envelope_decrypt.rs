//! Decrypting attacker-supplied envelopes must fail cleanly.

#![no_main]

use std::sync::LazyLock;

use cloakline_crypto::{ChunkCipher, CipherConfig, PrivateKey};
use libfuzzer_sys::fuzz_target;

static KEY: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(1024).expect("fuzz key"));

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let cipher = ChunkCipher::new(CipherConfig { chunk_size: 64 });
    let _ = cipher.decrypt_wire(&KEY, text);
});
