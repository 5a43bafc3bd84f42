//! Envelope wire type.
//!
//! An envelope is the ordered list of encoded ciphertext blocks for one logical
//! plaintext. Order is significant and the list is never empty: an empty
//! plaintext still encrypts to one block.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Ordered, non-empty list of base64 ciphertext blocks.
///
/// Serialized as a bare JSON array of strings, both as a top-level event
/// payload and when nested inside another payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Envelope {
    blocks: Vec<String>,
}

impl Envelope {
    /// Build from encoded blocks.
    ///
    /// # Errors
    ///
    /// `EmptyEnvelope` if `blocks` is empty.
    pub fn new(blocks: Vec<String>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(ProtocolError::EmptyEnvelope);
        }
        Ok(Self { blocks })
    }

    /// Encoded blocks in wire order.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Parse the JSON payload of an encrypted event.
    pub fn from_json(text: &str) -> Result<Self> {
        let blocks: Vec<String> = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
        Self::new(blocks)
    }

    /// Serialize to the JSON payload of an encrypted event.
    pub fn to_json(&self) -> String {
        // A Vec<String> always serializes.
        serde_json::to_string(&self.blocks).unwrap_or_default()
    }

    /// Blocks for in-place tampering in tests. The block count cannot change.
    #[doc(hidden)]
    pub fn blocks_mut(&mut self) -> &mut [String] {
        &mut self.blocks
    }
}

impl TryFrom<Vec<String>> for Envelope {
    type Error = ProtocolError;

    fn try_from(blocks: Vec<String>) -> Result<Self> {
        Self::new(blocks)
    }
}

impl From<Envelope> for Vec<String> {
    fn from(envelope: Envelope) -> Self {
        envelope.blocks
    }
}
