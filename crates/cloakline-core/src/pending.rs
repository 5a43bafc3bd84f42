//! Outstanding keyed requests.
//!
//! Contact-key lookups are asynchronous: the request goes out on
//! `userPublicKey` and the answer arrives later, possibly interleaved with
//! unrelated events. Each lookup is tracked here under the contact's username
//! so that concurrent lookups for different contacts cannot answer each other.
//!
//! Entries carry the connection generation they were issued on. A disconnect
//! rejects everything from that generation; a late response for an old
//! generation finds nothing to resolve.

use cloakline_proto::Contact;

/// One outstanding lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Contact whose key was requested.
    pub contact: Contact,
    /// Connection generation the request was sent on.
    pub generation: u64,
}

/// Table of outstanding lookups, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    entries: Vec<PendingRequest>,
}

impl PendingRequests {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a lookup for `contact`.
    ///
    /// Returns false if one is already outstanding for that username, in
    /// which case no new request should be sent.
    pub fn insert(&mut self, contact: Contact, generation: u64) -> bool {
        if self.contains(&contact.username) {
            return false;
        }
        self.entries.push(PendingRequest { contact, generation });
        true
    }

    /// Remove and return the request a response answers.
    ///
    /// With a username, the matching entry is resolved. Without one, the
    /// oldest entry of `generation` is, since the channel preserves order.
    pub fn resolve(&mut self, username: Option<&str>, generation: u64) -> Option<PendingRequest> {
        let index = self.entries.iter().position(|entry| {
            entry.generation == generation
                && username.is_none_or(|name| entry.contact.username == name)
        })?;
        Some(self.entries.remove(index))
    }

    /// Remove and return every entry of `generation`, oldest first.
    pub fn reject_generation(&mut self, generation: u64) -> Vec<PendingRequest> {
        let (rejected, kept) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| e.generation == generation);
        self.entries = kept;
        rejected
    }

    /// Whether a lookup for `username` is outstanding.
    pub fn contains(&self, username: &str) -> bool {
        self.entries.iter().any(|e| e.contact.username == username)
    }

    /// Number of outstanding lookups.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
