//! Change journal for the document store.
//!
//! Every committed write is recorded as a `ChangeEvent`. A `Journal` collects
//! the events of one commit and hands them out grouped per collection, which
//! is the unit change streams deliver.

use crate::collection::Collection;
use crate::document::{Document, Versioned};
use std::collections::BTreeMap;

/// What happened to a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single change to one document.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub key: String,
    /// Per-document version after the change.
    pub version: u64,
    /// Store-wide commit sequence of the change.
    pub sequence: u64,
    /// The new document contents; `None` for deletes.
    pub document: Option<Document>,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(doc: &Versioned) -> Self {
        Self {
            kind: ChangeKind::Insert,
            key: doc.key.clone(),
            version: doc.version,
            sequence: doc.sequence,
            document: Some(doc.document.clone()),
        }
    }

    /// Creates an update event.
    pub fn update(doc: &Versioned) -> Self {
        Self {
            kind: ChangeKind::Update,
            ..Self::insert(doc)
        }
    }

    /// Creates a delete event.
    pub fn delete(key: impl Into<String>, version: u64, sequence: u64) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
            version,
            sequence,
            document: None,
        }
    }

    /// Returns the event as a versioned document, if it carries one.
    pub fn to_versioned(&self) -> Option<Versioned> {
        self.document.as_ref().map(|document| Versioned {
            key: self.key.clone(),
            version: self.version,
            sequence: self.sequence,
            document: document.clone(),
        })
    }
}

/// The changes one commit made to one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeBatch {
    pub collection: Collection,
    pub events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    /// Creates a batch.
    pub fn new(collection: Collection, events: Vec<ChangeEvent>) -> Self {
        Self { collection, events }
    }

    /// Returns the highest commit sequence in the batch.
    pub fn sequence(&self) -> u64 {
        self.events.iter().map(|e| e.sequence).max().unwrap_or(0)
    }

    /// Returns true if the batch carries no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Journal for tracking the changes of a single commit.
#[derive(Debug, Default)]
pub struct Journal {
    /// Collection → events, in recording order.
    entries: BTreeMap<Collection, Vec<ChangeEvent>>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an insert.
    pub fn record_insert(&mut self, collection: &Collection, doc: &Versioned) {
        self.push(collection, ChangeEvent::insert(doc));
    }

    /// Records an update.
    pub fn record_update(&mut self, collection: &Collection, doc: &Versioned) {
        self.push(collection, ChangeEvent::update(doc));
    }

    /// Records a delete.
    pub fn record_delete(&mut self, collection: &Collection, key: &str, version: u64, sequence: u64) {
        self.push(collection, ChangeEvent::delete(key, version, sequence));
    }

    fn push(&mut self, collection: &Collection, event: ChangeEvent) {
        self.entries
            .entry(collection.clone())
            .or_default()
            .push(event);
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Finishes the journal, returning one batch per touched collection.
    pub fn commit(self) -> Vec<ChangeBatch> {
        self.entries
            .into_iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(collection, events)| ChangeBatch::new(collection, events))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::model::PollDraft;
    use agora_core::{PollId, Timestamp};

    fn versioned(key: &str, version: u64, sequence: u64) -> Versioned {
        let poll = PollDraft::poll("Q?", ["a", "b"]).into_poll(
            PollId::from(key),
            None,
            Timestamp::from_millis(sequence),
        );
        Versioned {
            key: key.into(),
            version,
            sequence,
            document: Document::Poll(poll),
        }
    }

    #[test]
    fn test_journal_groups_by_collection() {
        let mut journal = Journal::new();
        journal.record_insert(&Collection::Polls, &versioned("p1", 1, 1));
        journal.record_update(&Collection::Notifications, &versioned("n1", 2, 2));
        journal.record_delete(&Collection::Polls, "p0", 4, 3);

        assert_eq!(journal.len(), 3);
        let batches = journal.commit();
        assert_eq!(batches.len(), 2);

        let polls = batches
            .iter()
            .find(|b| b.collection == Collection::Polls)
            .unwrap();
        assert_eq!(polls.len(), 2);
        assert_eq!(polls.events[0].kind, ChangeKind::Insert);
        assert_eq!(polls.events[1].kind, ChangeKind::Delete);
        assert!(polls.events[1].document.is_none());
        assert_eq!(polls.sequence(), 3);
    }

    #[test]
    fn test_empty_journal() {
        let journal = Journal::new();
        assert!(journal.is_empty());
        assert!(journal.commit().is_empty());
    }

    #[test]
    fn test_event_to_versioned() {
        let doc = versioned("p1", 3, 9);
        let event = ChangeEvent::update(&doc);
        assert_eq!(event.to_versioned(), Some(doc));
        assert!(ChangeEvent::delete("p1", 4, 10).to_versioned().is_none());
    }
}
