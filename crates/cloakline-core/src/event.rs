//! Inputs to the session state machine.

use cloakline_crypto::PublicKeyHandle;
use cloakline_proto::{Contact, WireEvent, payloads::Credentials};

/// Something that happened: transport, server or user.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Transport connected.
    Connected,
    /// Transport closed, for any reason.
    Disconnected,
    /// Server sent an event.
    Received(WireEvent),
    /// User submitted the login form.
    SubmitLogin(Credentials),
    /// User submitted the register form.
    SubmitRegister {
        /// Username and password.
        credentials: Credentials,
        /// Password confirmation field.
        confirm: String,
    },
    /// User selected a contact.
    OpenConversation {
        /// Selected contact.
        contact: Contact,
        /// Key from the local cache, if present.
        cached_key: Option<PublicKeyHandle>,
    },
    /// User typed a message for the active contact.
    SendMessage {
        /// Message body.
        text: String,
    },
    /// User cleared the conversation view.
    ClearConversation,
}

impl SessionEvent {
    /// Short name for logs and violation reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connect",
            Self::Disconnected => "disconnect",
            Self::Received(wire) => wire.event.as_str(),
            Self::SubmitLogin(_) => "submitLogin",
            Self::SubmitRegister { .. } => "submitRegister",
            Self::OpenConversation { .. } => "openConversation",
            Self::SendMessage { .. } => "sendMessage",
            Self::ClearConversation => "clearConversation",
        }
    }
}
