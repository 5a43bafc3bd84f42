//! Chunked RSA-OAEP envelopes.
//!
//! RSA can only encrypt a bounded number of bytes per operation, so payloads
//! are split into fixed-size chunks, each encrypted as an independent OAEP
//! block and base64-encoded. The ordered list of blocks is the [`Envelope`].
//!
//! ```text
//! plaintext ──split(chunk_size)──> [c0, c1, .., cn]
//!                                     │   │       │
//!                                  OAEP OAEP    OAEP   (recipient public key)
//!                                     │   │       │
//!                                  base64 each block ──> ["..", "..", ".."]
//! ```
//!
//! Decryption is all-or-nothing: if any block fails, the caller gets an error
//! and none of the plaintext.
//!
//! The chunk size is part of the wire contract. Peers that disagree on it
//! still interoperate on decrypt (block boundaries are explicit) but a chunk
//! larger than the key's OAEP limit can never be encrypted, so it is checked
//! up front.

use base64::{Engine, engine::general_purpose::STANDARD};
use cloakline_proto::Envelope;
use rand::rngs::OsRng;
use rsa::Oaep;
use serde::{Serialize, de::DeserializeOwned};
use sha1::Sha1;

use crate::{
    error::{CryptoError, Result},
    keys::{PrivateKey, PublicKeyHandle},
};

/// Default plaintext bytes per block. Fits RSA-4096 (470-byte OAEP limit).
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Upper bound on the plaintext buffer reserved before decrypting. The block
/// count comes from the peer.
const MAX_PREALLOC: usize = 64 * 1024;

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherConfig {
    /// Maximum plaintext bytes per block.
    pub chunk_size: usize,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// Encrypts and decrypts envelopes with a fixed chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCipher {
    chunk_size: usize,
}

impl ChunkCipher {
    /// Create a cipher. A chunk size of zero is treated as one.
    pub fn new(config: CipherConfig) -> Self {
        Self { chunk_size: config.chunk_size.max(1) }
    }

    /// Plaintext bytes per block.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encrypt `plaintext` to `key`.
    ///
    /// Empty input still produces a single block.
    ///
    /// # Errors
    ///
    /// - `ChunkTooLarge` if the chunk size does not fit the key
    /// - `Encryption` if RSA fails
    pub fn encrypt(&self, key: &PublicKeyHandle, plaintext: &[u8]) -> Result<Envelope> {
        let limit = key.max_block_len();
        if self.chunk_size > limit {
            return Err(CryptoError::ChunkTooLarge { chunk_size: self.chunk_size, limit });
        }

        let chunks: Vec<&[u8]> =
            if plaintext.is_empty() { vec![plaintext] } else { plaintext.chunks(self.chunk_size).collect() };

        let mut rng = OsRng;
        let blocks = chunks
            .into_iter()
            .map(|chunk| {
                key.inner()
                    .encrypt(&mut rng, Oaep::new::<Sha1>(), chunk)
                    .map(|ciphertext| STANDARD.encode(ciphertext))
                    .map_err(|e| CryptoError::Encryption(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(bytes = plaintext.len(), blocks = blocks.len(), "encrypted envelope");
        Ok(Envelope::new(blocks)?)
    }

    /// Decrypt an envelope and reassemble the plaintext.
    ///
    /// # Errors
    ///
    /// - `EnvelopeFormat` if a block is not valid base64
    /// - `Decryption` if any block fails OAEP decryption
    pub fn decrypt(&self, key: &PrivateKey, envelope: &Envelope) -> Result<Vec<u8>> {
        let total = envelope.len();
        let mut plaintext = Vec::with_capacity(total.saturating_mul(self.chunk_size).min(MAX_PREALLOC));

        for (index, block) in envelope.blocks().iter().enumerate() {
            let ciphertext = STANDARD
                .decode(block)
                .map_err(|e| CryptoError::EnvelopeFormat(format!("block {index}: {e}")))?;
            let chunk = key
                .inner()
                .decrypt(Oaep::new::<Sha1>(), &ciphertext)
                .map_err(|_| CryptoError::Decryption { block: index, total })?;
            plaintext.extend_from_slice(&chunk);
        }

        Ok(plaintext)
    }

    /// Parse an envelope from its wire JSON and decrypt it.
    pub fn decrypt_wire(&self, key: &PrivateKey, data: &str) -> Result<Vec<u8>> {
        let envelope = Envelope::from_json(data)?;
        self.decrypt(key, &envelope)
    }

    /// Decrypt an envelope that must contain UTF-8 text.
    pub fn decrypt_text(&self, key: &PrivateKey, envelope: &Envelope) -> Result<String> {
        String::from_utf8(self.decrypt(key, envelope)?)
            .map_err(|e| CryptoError::PayloadFormat(e.to_string()))
    }

    /// Serialize `value` as JSON and encrypt it.
    pub fn encrypt_object<T: Serialize>(&self, key: &PublicKeyHandle, value: &T) -> Result<Envelope> {
        let json = serde_json::to_vec(value).map_err(|e| CryptoError::PayloadFormat(e.to_string()))?;
        self.encrypt(key, &json)
    }

    /// Decrypt an envelope and parse the JSON inside.
    ///
    /// # Errors
    ///
    /// Decryption errors as for [`Self::decrypt`], or `PayloadFormat` if the
    /// plaintext is not a valid `T`.
    pub fn decrypt_object<T: DeserializeOwned>(&self, key: &PrivateKey, envelope: &Envelope) -> Result<T> {
        let plaintext = self.decrypt(key, envelope)?;
        serde_json::from_slice(&plaintext).map_err(|e| CryptoError::PayloadFormat(e.to_string()))
    }

    /// [`Self::decrypt_object`] on wire JSON.
    pub fn decrypt_wire_object<T: DeserializeOwned>(&self, key: &PrivateKey, data: &str) -> Result<T> {
        let envelope = Envelope::from_json(data)?;
        self.decrypt_object(key, &envelope)
    }
}

impl Default for ChunkCipher {
    fn default() -> Self {
        Self::new(CipherConfig::default())
    }
}
