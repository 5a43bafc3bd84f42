//! Session logic for the Cloakline secure chat client.
//!
//! Everything here is sans-IO: the [`SessionHandshake`] consumes
//! [`SessionEvent`]s with an explicit timestamp and returns
//! [`SessionAction`]s for a driver to carry out. Presence reconciliation and
//! per-contact message queuing live in their own small state machines so they
//! can be tested without a session around them.
//!
//! # Components
//!
//! - [`SessionHandshake`]: key exchange, MAC exchange, authentication, routing
//! - [`PresenceTracker`]: online-user snapshots to `{added, removed}` diffs
//! - [`ConversationBacklog`]: live view plus per-contact unread queues
//! - [`PendingRequests`]: outstanding contact-key lookups
//! - [`ServerAddress`]: `hostname:port` validation before any I/O

pub mod action;
pub mod address;
pub mod backlog;
pub mod config;
pub mod error;
pub mod event;
pub mod pending;
pub mod presence;
pub mod session;

#[cfg(test)]
mod testing;

pub use action::{AuthForm, ErrorScope, SessionAction, View};
pub use address::{AddressError, ServerAddress};
pub use backlog::{ChatMessage, ConversationBacklog, Direction, Routed};
pub use config::SessionConfig;
pub use error::{RequestError, SessionError};
pub use event::SessionEvent;
pub use pending::{PendingRequest, PendingRequests};
pub use presence::{PresenceDiff, PresenceTracker};
pub use session::{Phase, SessionContext, SessionHandshake};
