//! Per-contact message queues.
//!
//! Only one conversation is on screen at a time. Messages for the active
//! contact go straight to the live view; everything else is queued under its
//! sender and flagged unread until that conversation is opened.
//!
//! # Invariants
//!
//! - A queued message is never dropped: it surfaces, in arrival order, the next
//!   time its contact is activated.
//! - The unread flag is set only when a message is queued, and cleared only by
//!   activation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the contact to us.
    Incoming,
    /// From us to the contact.
    Outgoing,
}

/// A decrypted chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Session-unique, increasing identifier.
    pub id: u64,
    /// Username of the other party in the conversation.
    pub contact: String,
    /// Plaintext body.
    pub body: String,
    /// Direction.
    pub direction: Direction,
}

/// Outcome of [`ConversationBacklog::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Shown in the live view.
    Delivered,
    /// Queued for later.
    Queued {
        /// True if the contact was not already unread.
        newly_unread: bool,
    },
}

/// Live view plus queues for inactive conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationBacklog {
    active: Option<String>,
    live: Vec<ChatMessage>,
    queues: BTreeMap<String, VecDeque<ChatMessage>>,
    unread: BTreeSet<String>,
}

impl ConversationBacklog {
    /// Empty backlog, no active conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver or queue a message for `message.contact`.
    pub fn route(&mut self, message: ChatMessage) -> Routed {
        if self.active.as_deref() == Some(message.contact.as_str()) {
            self.live.push(message);
            return Routed::Delivered;
        }

        let newly_unread = self.unread.insert(message.contact.clone());
        self.queues.entry(message.contact.clone()).or_default().push_back(message);
        Routed::Queued { newly_unread }
    }

    /// Make `contact` the active conversation and return its live view.
    ///
    /// Switching contacts replaces the live view; re-activating the current
    /// contact keeps it. Either way the contact's queue is appended in arrival
    /// order and its unread flag is cleared.
    pub fn activate(&mut self, contact: &str) -> Vec<ChatMessage> {
        if self.active.as_deref() != Some(contact) {
            self.live.clear();
        }
        if let Some(queue) = self.queues.remove(contact) {
            self.live.extend(queue);
        }
        self.unread.remove(contact);
        self.active = Some(contact.to_string());
        self.live.clone()
    }

    /// Empty the live view. Queues are untouched.
    pub fn clear(&mut self) {
        self.live.clear();
    }

    /// Active contact, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Messages currently on screen.
    pub fn live(&self) -> &[ChatMessage] {
        &self.live
    }

    /// Queued messages for `contact`, oldest first.
    pub fn pending(&self, contact: &str) -> impl Iterator<Item = &ChatMessage> {
        self.queues.get(contact).into_iter().flatten()
    }

    /// Whether `contact` has unseen messages.
    pub fn is_unread(&self, contact: &str) -> bool {
        self.unread.contains(contact)
    }

    /// Contacts with unseen messages, alphabetically.
    pub fn unread(&self) -> impl Iterator<Item = &str> {
        self.unread.iter().map(String::as_str)
    }

    /// Drop all state (on disconnect).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
