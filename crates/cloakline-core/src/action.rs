//! Effects requested by the session state machine.

use cloakline_proto::{Contact, WireEvent};

use crate::{backlog::ChatMessage, error::RequestError, presence::PresenceDiff, session::Phase};

/// Screen the client should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Server address entry.
    Connection,
    /// Login / register forms.
    Auth,
    /// Contacts and conversation.
    Chat,
}

/// Where an error message belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Connection screen (handshake and transport problems).
    Connection,
    /// Auth forms.
    Auth,
    /// Chat screen.
    Chat,
}

/// Which auth form a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthForm {
    /// Login.
    Login,
    /// Register.
    Register,
}

impl AuthForm {
    /// Event name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// Actions returned by [`crate::SessionHandshake`].
///
/// The driver executes them in order:
/// - `Send`, `CloseTransport`: transport I/O
/// - `CacheContactKey`: key cache write
/// - everything else: presentation
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send this event to the server.
    Send(WireEvent),

    /// Close the transport.
    CloseTransport,

    /// Phase transition happened.
    PhaseChanged(Phase),

    /// Switch screens.
    ShowView(View),

    /// Show an error message.
    ShowError {
        /// Where to show it.
        scope: ErrorScope,
        /// User-facing text.
        message: String,
    },

    /// Enable or disable an auth form's submit control.
    SetSubmitEnabled {
        /// Which form.
        form: AuthForm,
        /// New state.
        enabled: bool,
    },

    /// Online list changed.
    PresenceChanged(PresenceDiff),

    /// Append a message to the live conversation view.
    DeliverMessage(ChatMessage),

    /// Flag a contact as having unseen messages.
    MarkUnread {
        /// Contact username.
        contact: String,
    },

    /// Replace the conversation view.
    ShowConversation {
        /// Contact username.
        contact: String,
        /// Everything the view should now contain, oldest first.
        messages: Vec<ChatMessage>,
    },

    /// Empty the conversation view.
    ClearConversation,

    /// Persist a fetched contact key.
    CacheContactKey {
        /// Whose key.
        contact: Contact,
        /// PEM as received.
        pem: String,
    },

    /// A keyed request failed.
    RequestFailed {
        /// Contact the request was for.
        username: String,
        /// Why.
        error: RequestError,
    },
}
