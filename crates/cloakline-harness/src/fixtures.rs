//! Shared key fixtures.
//!
//! RSA generation is slow, so each key is generated once per test binary and
//! shared. 2048-bit keys with a 190-byte chunk size keep envelopes multi-block
//! for realistic payloads while staying fast.
#![allow(clippy::expect_used)]

use std::{sync::LazyLock, time::Duration};

use cloakline_core::{SessionConfig, SessionError, SessionHandshake};
use cloakline_crypto::{CipherConfig, PrivateKey};

/// Modulus size of every fixture key.
pub const KEY_BITS: usize = 2048;

/// Chunk size under the 214-byte OAEP limit of [`KEY_BITS`].
pub const CHUNK_SIZE: usize = 190;

static CLIENT: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("client key"));
static SERVER: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("server key"));
static BOB: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("bob key"));
static CAROL: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("carol key"));

/// Key of the client under test.
pub fn client_key() -> &'static PrivateKey {
    &CLIENT
}

/// Key of the simulated server.
pub fn server_key() -> &'static PrivateKey {
    &SERVER
}

/// Key of the contact "bob".
pub fn bob_key() -> &'static PrivateKey {
    &BOB
}

/// Key of the contact "carol".
pub fn carol_key() -> &'static PrivateKey {
    &CAROL
}

/// Public PEM of a fixture key.
pub fn pem_of(key: &PrivateKey) -> String {
    key.public_key().to_pem().expect("fixture key encodes")
}

/// Cipher settings matching the fixture keys.
pub fn cipher_config() -> CipherConfig {
    CipherConfig { chunk_size: CHUNK_SIZE }
}

/// Session settings matching the fixture keys.
pub fn session_config() -> SessionConfig {
    SessionConfig { presence_interval: Duration::from_secs(1), cipher: cipher_config() }
}

/// Disconnected session for the fixture client key.
pub fn session() -> Result<SessionHandshake, SessionError> {
    SessionHandshake::new(session_config(), client_key().clone())
}
