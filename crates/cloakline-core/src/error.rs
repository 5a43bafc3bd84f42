//! Session error types.

use cloakline_crypto::CryptoError;
use thiserror::Error;

use crate::{address::AddressError, session::Phase};

/// Errors returned by the session state machine.
///
/// Incoming-event failures are mostly *not* errors: they are converted into
/// user-visible actions so one bad payload never ends the session. What
/// remains here is either a caller mistake (wrong phase, missing contact) or
/// an outgoing operation that could not be built.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Event arrived outside the phase that expects it. State is unchanged.
    #[error("{event} not valid in phase {phase:?}")]
    HandshakeViolation {
        /// Phase at the time of the event.
        phase: Phase,
        /// Event name.
        event: &'static str,
    },

    /// Transport-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Server address failed validation; nothing was sent.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// A login or register request is already awaiting its response.
    #[error("a {0} request is already in flight")]
    SubmissionInFlight(&'static str),

    /// No conversation is open.
    #[error("no active conversation")]
    NoActiveContact,

    /// The active contact's public key has not arrived yet.
    #[error("public key for {username} not available yet")]
    ContactKeyUnavailable {
        /// Contact username.
        username: String,
    },

    /// Building an outgoing envelope failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Failure of a keyed request, delivered to whoever issued it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Server answered with `success: false`.
    #[error("rejected by server: {}", reason.as_deref().unwrap_or("no reason given"))]
    Rejected {
        /// Server-supplied reason, when available.
        reason: Option<String>,
    },

    /// Connection closed before the response arrived.
    #[error("disconnected before response")]
    Disconnected,
}
