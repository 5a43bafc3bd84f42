//! Crypto error types.

use std::{io, path::PathBuf};

use cloakline_proto::ProtocolError;
use thiserror::Error;

/// Result alias for key and envelope operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors from key handling and envelope encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be parsed or encoded.
    #[error("invalid key: {0}")]
    KeyFormat(String),

    /// No cached public key for this contact.
    #[error("no cached public key for {contact}")]
    KeyNotCached {
        /// Contact username.
        contact: String,
    },

    /// Envelope could not be parsed into blocks.
    #[error("malformed envelope: {0}")]
    EnvelopeFormat(String),

    /// A block failed to decrypt. The whole envelope is discarded.
    #[error("failed to decrypt block {block} of {total}")]
    Decryption {
        /// Index of the first failing block.
        block: usize,
        /// Blocks in the envelope.
        total: usize,
    },

    /// Decrypted plaintext is not the expected structure.
    #[error("invalid payload: {0}")]
    PayloadFormat(String),

    /// Configured chunk size does not fit in one OAEP block for this key.
    #[error("chunk size {chunk_size} exceeds the {limit}-byte OAEP limit of the key")]
    ChunkTooLarge {
        /// Configured plaintext chunk size.
        chunk_size: usize,
        /// Largest plaintext the key can encrypt in one block.
        limit: usize,
    },

    /// RSA key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// RSA encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Key cache I/O failed.
    #[error("key cache I/O on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl From<ProtocolError> for CryptoError {
    fn from(err: ProtocolError) -> Self {
        Self::EnvelopeFormat(err.to_string())
    }
}
