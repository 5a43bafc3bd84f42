//! Key lifecycle and envelope encryption for Cloakline.
//!
//! Two pieces:
//!
//! - [`KeyStore`]: the local identity keypair and fetched contact keys, cached
//!   as PEM files. The private key is encrypted at rest.
//! - [`ChunkCipher`]: RSA-OAEP over arbitrarily long payloads by splitting
//!   them into fixed-size blocks. Produces and consumes
//!   [`cloakline_proto::Envelope`].
//!
//! Everything here is synchronous and free of network I/O.

pub mod chunk;
pub mod error;
pub mod keys;
pub mod keystore;

#[cfg(test)]
mod testing;

pub use chunk::{CipherConfig, ChunkCipher, DEFAULT_CHUNK_SIZE};
pub use error::{CryptoError, Result};
pub use keys::{KeyPair, Passphrase, PrivateKey, PublicKeyHandle};
pub use keystore::{KeyStore, KeyStoreConfig};
