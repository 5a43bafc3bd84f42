//! Login and registration payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Username/password pair sent on `login` and `register`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password, in the clear inside the envelope.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server reply to `login` / `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Whether the account operation succeeded.
    pub success: bool,
    /// Human-readable status, shown to the user on failure.
    #[serde(default)]
    pub message: String,
    /// Canonical username, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
