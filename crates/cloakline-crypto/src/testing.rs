//! Shared key fixtures for unit tests. Generated once per test binary.

use std::sync::LazyLock;

use crate::{chunk::CipherConfig, keys::PrivateKey};

pub const KEY_BITS: usize = 2048;

/// Fits under the 214-byte OAEP limit of a 2048-bit key.
pub const CHUNK_SIZE: usize = 190;

static CLIENT: LazyLock<PrivateKey> =
    LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("client fixture key"));

static SERVER: LazyLock<PrivateKey> =
    LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("server fixture key"));

pub fn client_key() -> &'static PrivateKey {
    &CLIENT
}

pub fn server_key() -> &'static PrivateKey {
    &SERVER
}

pub fn cipher_config() -> CipherConfig {
    CipherConfig { chunk_size: CHUNK_SIZE }
}
