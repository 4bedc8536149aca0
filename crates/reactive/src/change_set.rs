//! Change set for tracking view changes.
//!
//! A ChangeSet represents the difference between two snapshots of a view,
//! containing added, removed, and modified documents.

use crate::snapshot::Snapshot;
use agora_storage::Versioned;
use std::sync::Arc;

/// A set of changes to a view.
///
/// This struct tracks:
/// - `added`: Documents that entered the view
/// - `removed`: Documents that left the view
/// - `modified`: Documents that were updated in place (old value, new value)
/// - `current`: The complete snapshot after applying changes
///
/// `current` is authoritative. A viewer that missed earlier change sets can
/// always rebuild its state from it.
#[derive(Clone, Debug)]
pub struct ChangeSet {
    /// Documents that were added to the view
    pub added: Vec<Arc<Versioned>>,
    /// Documents that were removed from the view
    pub removed: Vec<Arc<Versioned>>,
    /// Documents that were modified (old, new)
    pub modified: Vec<(Arc<Versioned>, Arc<Versioned>)>,
    /// The complete view after applying changes
    pub current: Arc<Snapshot>,
}

impl ChangeSet {
    /// Creates an empty change set against `current`.
    #[inline]
    pub fn new(current: Arc<Snapshot>) -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            modified: Vec::new(),
            current,
        }
    }

    /// Creates a change set representing an initial view.
    ///
    /// All documents are treated as additions.
    pub fn initial(current: Arc<Snapshot>) -> Self {
        Self {
            added: current.entries().to_vec(),
            ..Self::new(current)
        }
    }

    /// Returns the revision of the snapshot this change set leads to.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.current.revision()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Adds an inserted document.
    #[inline]
    pub fn add(&mut self, doc: Arc<Versioned>) {
        self.added.push(doc);
    }

    /// Adds a removed document.
    #[inline]
    pub fn remove(&mut self, doc: Arc<Versioned>) {
        self.removed.push(doc);
    }

    /// Adds a modified document pair.
    #[inline]
    pub fn modify(&mut self, old: Arc<Versioned>, new: Arc<Versioned>) {
        self.modified.push((old, new));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDescriptor;
    use agora_core::model::PollDraft;
    use agora_core::{PollId, Timestamp};
    use agora_storage::Document;

    fn make_doc(key: &str, version: u64) -> Arc<Versioned> {
        let poll = PollDraft::poll("Q?", ["a", "b"]).into_poll(
            PollId::from(key),
            None,
            Timestamp::from_millis(version),
        );
        Arc::new(Versioned {
            key: key.into(),
            version,
            sequence: version,
            document: Document::Poll(poll),
        })
    }

    fn snapshot(entries: Vec<Arc<Versioned>>) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(QueryDescriptor::AllPolls, entries, 3, false))
    }

    #[test]
    fn test_change_set_new() {
        let cs = ChangeSet::new(snapshot(Vec::new()));
        assert!(cs.is_empty());
        assert_eq!(cs.len(), 0);
        assert_eq!(cs.revision(), 3);
    }

    #[test]
    fn test_change_set_initial() {
        let cs = ChangeSet::initial(snapshot(vec![make_doc("p1", 1), make_doc("p2", 1)]));

        assert_eq!(cs.added.len(), 2);
        assert!(cs.removed.is_empty());
        assert!(cs.modified.is_empty());
        assert_eq!(cs.current.len(), 2);
    }

    #[test]
    fn test_change_set_modify() {
        let mut cs = ChangeSet::new(snapshot(Vec::new()));
        cs.modify(make_doc("p1", 1), make_doc("p1", 2));
        cs.remove(make_doc("p2", 1));

        assert!(cs.added.is_empty());
        assert_eq!(cs.modified.len(), 1);
        assert_eq!(cs.len(), 2);
    }
}
