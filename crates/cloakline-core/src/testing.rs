//! Key fixtures and sealing helpers for unit tests.

use std::{sync::LazyLock, time::Duration};

use cloakline_crypto::{ChunkCipher, CipherConfig, PrivateKey};
use cloakline_proto::Envelope;
use serde::{Serialize, de::DeserializeOwned};

use crate::config::SessionConfig;

const KEY_BITS: usize = 2048;
const CHUNK_SIZE: usize = 190;

static CLIENT: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("client key"));
static SERVER: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("server key"));
static BOB: LazyLock<PrivateKey> = LazyLock::new(|| PrivateKey::generate(KEY_BITS).expect("bob key"));

/// Fixture key owners.
#[derive(Debug, Clone, Copy)]
pub enum Peer {
    Client,
    Server,
    Bob,
}

fn key(peer: Peer) -> &'static PrivateKey {
    match peer {
        Peer::Client => &CLIENT,
        Peer::Server => &SERVER,
        Peer::Bob => &BOB,
    }
}

fn cipher() -> ChunkCipher {
    ChunkCipher::new(CipherConfig { chunk_size: CHUNK_SIZE })
}

pub fn client_key() -> &'static PrivateKey {
    &CLIENT
}

pub fn server_key() -> &'static PrivateKey {
    &SERVER
}

pub fn bob_key() -> &'static PrivateKey {
    &BOB
}

pub fn session_config() -> SessionConfig {
    SessionConfig { presence_interval: Duration::from_secs(1), cipher: CipherConfig { chunk_size: CHUNK_SIZE } }
}

pub fn pem(peer: Peer) -> String {
    key(peer).public_key().to_pem().unwrap()
}

pub fn server_pem() -> String {
    pem(Peer::Server)
}

/// Encrypt bytes to `peer`.
pub fn seal_envelope(peer: Peer, plaintext: &[u8]) -> Envelope {
    cipher().encrypt(&key(peer).public_key(), plaintext).unwrap()
}

/// Encrypt text to `peer`, as wire JSON.
pub fn seal_text(peer: Peer, text: &str) -> String {
    seal_envelope(peer, text.as_bytes()).to_json()
}

/// Encrypt a payload to `peer`, as wire JSON.
pub fn seal<T: Serialize>(peer: Peer, value: &T) -> String {
    cipher().encrypt_object(&key(peer).public_key(), value).unwrap().to_json()
}

/// Decrypt wire JSON addressed to `peer`.
pub fn unseal<T: DeserializeOwned>(peer: Peer, data: &str) -> T {
    cipher().decrypt_wire_object(key(peer), data).unwrap()
}

/// Decrypt an inner envelope addressed to `peer`.
pub fn open_text(peer: Peer, envelope: &Envelope) -> String {
    cipher().decrypt_text(key(peer), envelope).unwrap()
}
