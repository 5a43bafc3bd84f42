//! Chat message payloads.
//!
//! Message bodies are end-to-end encrypted: the inner envelope is addressed to
//! the final reader's own key and nested, as a JSON array, inside the outer
//! envelope exchanged with the server. The server can route but not read.

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Body of an outgoing `message` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient username.
    pub to: String,
    /// Body encrypted to the recipient's key.
    pub message: Envelope,
    /// Body encrypted to the sender's own key, returned on `messageResult`.
    pub echo: Envelope,
}

/// Incoming `message`, `loadMessage` or `messageResult` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedMessage {
    /// Sender username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Body encrypted to our own key.
    pub message: Envelope,
}
