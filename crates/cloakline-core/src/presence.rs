//! Online-user reconciliation.
//!
//! The server pushes full snapshots; the UI wants deltas. The tracker keeps the
//! last rendered set and reports only what changed, in display order
//! (alphabetical by username).

use std::collections::BTreeSet;

use cloakline_proto::Contact;

/// Change between two presence snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceDiff {
    /// Newly online, in display order.
    pub added: Vec<Contact>,
    /// No longer online, in display order.
    pub removed: Vec<Contact>,
}

impl PresenceDiff {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Last rendered presence snapshot.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    online: BTreeSet<Contact>,
}

impl PresenceTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot and report the difference.
    ///
    /// Duplicates in `snapshot` collapse. Reconciling the same snapshot twice
    /// yields an empty diff the second time.
    pub fn reconcile(&mut self, snapshot: impl IntoIterator<Item = Contact>) -> PresenceDiff {
        let next: BTreeSet<Contact> = snapshot.into_iter().collect();
        let added = next.difference(&self.online).cloned().collect();
        let removed = self.online.difference(&next).cloned().collect();
        self.online = next;
        PresenceDiff { added, removed }
    }

    /// Currently online contacts in display order.
    pub fn online(&self) -> impl Iterator<Item = &Contact> {
        self.online.iter()
    }

    /// Look up an online contact by username.
    pub fn find(&self, username: &str) -> Option<&Contact> {
        self.online.iter().find(|c| c.username == username)
    }

    /// Forget everything (on disconnect).
    pub fn reset(&mut self) {
        self.online.clear();
    }
}
