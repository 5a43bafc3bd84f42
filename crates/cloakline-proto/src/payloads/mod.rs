//! Decrypted payload schemas.
//!
//! Requests from the client wrap their data in [`Authenticated`], which
//! carries the session MAC alongside it. Responses from the server are plain
//! documents. Field names match the JSON the server speaks, hence the
//! occasional `rename`.

pub mod auth;
pub mod chat;
pub mod directory;

use serde::{Deserialize, Serialize};

pub use auth::{AuthResponse, Credentials};
pub use chat::{OutgoingMessage, RelayedMessage};
pub use directory::{Contact, OnlineUsersResponse, PublicKeyRequest, PublicKeyResponse};

/// Client request carrying the session MAC.
///
/// Serializes as `{"MAC": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated<T> {
    /// Session MAC issued during the handshake.
    #[serde(rename = "MAC")]
    pub mac: String,
    /// Request body.
    pub data: T,
}

impl<T> Authenticated<T> {
    /// Wrap `data` with the session MAC.
    pub fn new(mac: impl Into<String>, data: T) -> Self {
        Self { mac: mac.into(), data }
    }
}

/// Empty request body (`{}`), used by `onlineUsers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
