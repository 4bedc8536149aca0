//! Change feed reconciliation.
//!
//! `ChangeFeedReconciler` turns the raw messages of a store change stream
//! into a sequence of immutable, recency-ordered snapshots. Ordering comes
//! from a local sorted index; the store is never re-queried.
//!
//! Every document in the view carries the last version applied to it, and
//! deletes leave a tombstone version behind. Events at or below that version
//! are stale and dropped, so a snapshot never rolls back when transport
//! reorders or replays events. Tombstones only guard the stream that produced
//! them; a fresh full snapshot drops them. Documents that never entered the
//! view are not tracked.

use crate::change_set::ChangeSet;
use crate::query::QueryDescriptor;
use crate::snapshot::Snapshot;
use agora_core::Timestamp;
use agora_storage::{ChangeBatch, ChangeEvent, ChangeKind, Versioned};
use core::cmp::Reverse;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Index key: newest first, document key as tiebreak.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    created_at: Reverse<Timestamp>,
    key: String,
}

impl SortKey {
    fn of(doc: &Versioned) -> Self {
        Self {
            created_at: Reverse(doc.created_at()),
            key: doc.key.clone(),
        }
    }
}

/// What the reconciler last applied for a key.
#[derive(Clone, Debug)]
enum DocState {
    /// In the view at `version`.
    Live { version: u64, sort_key: SortKey },
    /// Deleted, or moved out of the view, at `version`.
    Gone { version: u64 },
}

impl DocState {
    fn version(&self) -> u64 {
        match self {
            DocState::Live { version, .. } | DocState::Gone { version } => *version,
        }
    }

    fn sort_key(&self) -> Option<&SortKey> {
        match self {
            DocState::Live { sort_key, .. } => Some(sort_key),
            DocState::Gone { .. } => None,
        }
    }

    fn is_live(&self) -> bool {
        matches!(self, DocState::Live { .. })
    }
}

/// Materializes one view from its change stream.
pub struct ChangeFeedReconciler {
    descriptor: QueryDescriptor,
    index: BTreeMap<SortKey, Arc<Versioned>>,
    states: HashMap<String, DocState>,
    revision: u64,
    degraded: bool,
    current: Arc<Snapshot>,
}

impl ChangeFeedReconciler {
    /// Creates a reconciler with an empty view at revision 0.
    pub fn new(descriptor: QueryDescriptor) -> Self {
        Self {
            current: Arc::new(Snapshot::empty(descriptor.clone())),
            descriptor,
            index: BTreeMap::new(),
            states: HashMap::new(),
            revision: 0,
            degraded: false,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Returns the last published snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.clone()
    }

    /// Returns true once a full snapshot has been reconciled.
    #[inline]
    pub fn is_primed(&self) -> bool {
        self.revision > 0
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Applies one change batch.
    ///
    /// Events are applied in store sequence order. Returns the change set of
    /// the newly published snapshot, or `None` if the batch changed nothing
    /// in the view.
    pub fn apply_batch(&mut self, batch: &ChangeBatch) -> Option<ChangeSet> {
        if batch.collection != self.descriptor.collection() {
            return None;
        }

        let mut events: Vec<&ChangeEvent> = batch.events.iter().collect();
        events.sort_by_key(|e| e.sequence);

        let mut changes = ChangeSet::new(self.current.clone());
        for event in events {
            self.apply_event(event, &mut changes);
        }
        if changes.is_empty() {
            return None;
        }
        Some(self.publish(changes))
    }

    /// Reconciles a full snapshot from a (re-)established stream.
    ///
    /// Documents missing from the snapshot leave the view, newer versions are
    /// applied, and degraded mode is cleared. Always publishes on the first
    /// snapshot or when leaving degraded mode.
    ///
    /// The snapshot supersedes everything the previous stream delivered, so
    /// only the keys now in the view stay tracked afterwards.
    pub fn apply_snapshot(&mut self, documents: &[Versioned]) -> Option<ChangeSet> {
        let mut changes = ChangeSet::new(self.current.clone());
        let present: HashSet<&str> = documents.iter().map(|doc| doc.key.as_str()).collect();

        let vanished: Vec<(String, u64)> = self
            .states
            .iter()
            .filter(|(key, state)| state.is_live() && !present.contains(key.as_str()))
            .map(|(key, state)| (key.clone(), state.version()))
            .collect();
        for (key, version) in vanished {
            self.remove(&key, version, &mut changes);
        }

        for doc in documents {
            if self.is_stale(&doc.key, doc.version) {
                continue;
            }
            self.upsert(doc.clone(), &mut changes);
        }
        self.states.retain(|_, state| state.is_live());

        let was_degraded = self.degraded;
        self.degraded = false;
        if changes.is_empty() && self.is_primed() && !was_degraded {
            return None;
        }
        Some(self.publish(changes))
    }

    /// Enters degraded mode and publishes the last good contents flagged as
    /// degraded.
    pub fn fail(&mut self) -> Arc<Snapshot> {
        self.degraded = true;
        self.revision += 1;
        self.current = Arc::new(Snapshot::new(
            self.descriptor.clone(),
            self.current.entries().to_vec(),
            self.revision,
            true,
        ));
        self.current.clone()
    }

    fn is_stale(&self, key: &str, version: u64) -> bool {
        self.states
            .get(key)
            .is_some_and(|state| version <= state.version())
    }

    fn apply_event(&mut self, event: &ChangeEvent, changes: &mut ChangeSet) {
        if self.is_stale(&event.key, event.version) {
            trace!(key = %event.key, version = event.version, "dropping stale event");
            return;
        }
        match (event.kind, event.to_versioned()) {
            (ChangeKind::Delete, _) | (_, None) => self.remove(&event.key, event.version, changes),
            (_, Some(doc)) => self.upsert(doc, changes),
        }
    }

    fn upsert(&mut self, doc: Versioned, changes: &mut ChangeSet) {
        let old = self
            .states
            .get(&doc.key)
            .and_then(DocState::sort_key)
            .and_then(|sort_key| self.index.remove(sort_key));

        let key = doc.key.clone();
        let version = doc.version;
        if !self.descriptor.matches(&doc.document) {
            // Only keys that were in the view need a version to compare
            // against.
            if let Some(state) = self.states.get_mut(&key) {
                *state = DocState::Gone { version };
            }
            if let Some(old) = old {
                changes.remove(old);
            }
            return;
        }

        let sort_key = SortKey::of(&doc);
        let doc = Arc::new(doc);
        self.index.insert(sort_key.clone(), doc.clone());
        self.states.insert(key, DocState::Live { version, sort_key });
        match old {
            Some(old) => changes.modify(old, doc),
            None => changes.add(doc),
        }
    }

    fn remove(&mut self, key: &str, version: u64, changes: &mut ChangeSet) {
        let old = self
            .states
            .get(key)
            .and_then(DocState::sort_key)
            .and_then(|sort_key| self.index.remove(sort_key));
        if let Some(old) = old {
            changes.remove(old);
        }
        self.states.insert(key.to_string(), DocState::Gone { version });
    }

    fn publish(&mut self, mut changes: ChangeSet) -> ChangeSet {
        self.revision += 1;
        self.current = Arc::new(Snapshot::new(
            self.descriptor.clone(),
            self.index.values().cloned().collect(),
            self.revision,
            self.degraded,
        ));
        changes.current = self.current.clone();
        changes
    }

    /// Returns how many keys carry version state.
    #[inline]
    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }
}
