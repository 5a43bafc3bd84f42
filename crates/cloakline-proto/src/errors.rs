//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding wire events and envelopes.
///
/// These never carry plaintext. Decryption failures live in the crypto crate;
/// this layer only knows about shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Event name not part of the protocol.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Transport frame could not be parsed as `{event, data}`.
    #[error("malformed wire frame: {0}")]
    MalformedFrame(String),

    /// Envelope is not a JSON array of strings.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope parsed but contains no blocks.
    #[error("envelope contains no blocks")]
    EmptyEnvelope,
}
