//! In-memory document store.
//!
//! `MemoryStore` keeps every collection in process and honours the full
//! `DocumentStore` contract: version-checked commits, atomic batches, change
//! streams that start with a snapshot, and monotonic server timestamps.
//! Each async call yields once before touching state so concurrent callers
//! interleave the way they would against a remote store.
//!
//! Fault injection hooks let tests force commit conflicts, failing inserts,
//! failing stream opens and stream end-of-life errors.

use crate::backend::DocumentStore;
use crate::collection::Collection;
use crate::document::{Document, Versioned};
use crate::error::StoreError;
use crate::journal::{ChangeBatch, Journal};
use crate::stream::{ChangeStream, ListenerGuard, StreamMessage};
use crate::transaction::{BatchWrite, CommitResult};
use agora_core::Timestamp;
use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type ListenerId = u64;

#[derive(Default)]
struct State {
    /// Collection → key → document.
    collections: HashMap<Collection, HashMap<String, Versioned>>,
    /// Last commit sequence handed out.
    sequence: u64,
}

impl State {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn sorted(&self, collection: &Collection) -> Vec<Versioned> {
        let mut docs: Vec<Versioned> = self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.key.cmp(&b.key))
        });
        docs
    }

    fn check_version(&self, collection: &Collection, key: &str, expected: u64) -> Option<CommitResult> {
        let actual = self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|doc| doc.version);
        if actual == Some(expected) {
            None
        } else {
            Some(CommitResult::VersionConflict {
                key: key.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Replaces an existing document, keeping its key and creation time.
    fn replace(&mut self, collection: &Collection, key: &str, mut document: Document, journal: &mut Journal) -> u64 {
        let sequence = self.next_sequence();
        if let Some(current) = self
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
        {
            document.assign(key, current.created_at());
            current.version += 1;
            current.sequence = sequence;
            current.document = document;
            journal.record_update(collection, current);
        }
        sequence
    }
}

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    by_collection: HashMap<Collection, Vec<(ListenerId, mpsc::UnboundedSender<StreamMessage>)>>,
}

impl Listeners {
    fn add(&mut self, collection: &Collection, sender: mpsc::UnboundedSender<StreamMessage>) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        self.by_collection
            .entry(collection.clone())
            .or_default()
            .push((id, sender));
        id
    }

    fn remove(&mut self, collection: &Collection, id: ListenerId) {
        if let Some(senders) = self.by_collection.get_mut(collection) {
            senders.retain(|(listener, _)| *listener != id);
            if senders.is_empty() {
                self.by_collection.remove(collection);
            }
        }
    }

    fn publish(&mut self, batches: Vec<ChangeBatch>) {
        for batch in batches {
            if let Some(senders) = self.by_collection.get_mut(&batch.collection) {
                senders.retain(|(_, tx)| tx.send(StreamMessage::Changes(batch.clone())).is_ok());
            }
        }
    }
}

#[derive(Default)]
struct Faults {
    forced_conflicts: u32,
    failing_inserts: HashMap<Collection, u32>,
    failing_watches: u32,
}

/// An in-process `DocumentStore`.
pub struct MemoryStore {
    state: Mutex<State>,
    listeners: Arc<Mutex<Listeners>>,
    faults: Mutex<Faults>,
    clock: AtomicU64,
    commit_attempts: AtomicU64,
    writes_applied: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            faults: Mutex::new(Faults::default()),
            clock: AtomicU64::new(0),
            commit_attempts: AtomicU64::new(0),
            writes_applied: AtomicU64::new(0),
        }
    }

    /// Makes the next `n` commits (single or batch) report a version
    /// conflict without writing anything.
    pub fn force_conflicts(&self, n: u32) {
        self.faults.lock().forced_conflicts = n;
    }

    /// Makes the next `n` inserts into `collection` fail.
    pub fn fail_next_inserts(&self, collection: Collection, n: u32) {
        self.faults.lock().failing_inserts.insert(collection, n);
    }

    /// Makes the next `n` calls to `watch` fail.
    pub fn fail_next_watches(&self, n: u32) {
        self.faults.lock().failing_watches = n;
    }

    /// Ends every open stream on `collection` with an error signal.
    pub fn break_streams(&self, collection: &Collection, reason: &str) {
        let senders = self.listeners.lock().by_collection.remove(collection);
        let senders = senders.unwrap_or_default();
        warn!(collection = %collection, listeners = senders.len(), reason, "breaking change streams");
        for (_, tx) in senders {
            let _ = tx.send(StreamMessage::Error(StoreError::StreamFailed {
                collection: collection.clone(),
                reason: reason.to_string(),
            }));
        }
    }

    /// Returns the number of open listeners on a collection.
    pub fn listener_count(&self, collection: &Collection) -> usize {
        self.listeners
            .lock()
            .by_collection
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Returns how many conditional commits were attempted.
    pub fn commit_attempts(&self) -> u64 {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Returns how many document writes were applied (inserts, updates and
    /// deletes).
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied.load(Ordering::SeqCst)
    }

    /// Returns the number of documents in a collection.
    pub fn len(&self, collection: &Collection) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, HashMap::len)
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self, collection: &Collection) -> bool {
        self.len(collection) == 0
    }

    fn take_forced_conflict(&self) -> bool {
        let mut faults = self.faults.lock();
        if faults.forced_conflicts > 0 {
            faults.forced_conflicts -= 1;
            true
        } else {
            false
        }
    }

    fn take_failing_insert(&self, collection: &Collection) -> bool {
        let mut faults = self.faults.lock();
        match faults.failing_inserts.get_mut(collection) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn applied(&self, writes: usize) {
        self.writes_applied.fetch_add(writes as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &Collection, mut document: Document) -> Result<Versioned, StoreError> {
        tokio::task::yield_now().await;
        if self.take_failing_insert(collection) {
            return Err(StoreError::Unavailable(format!("insert into {} failed", collection)));
        }

        let mut state = self.state.lock();
        let key = uuid::Uuid::new_v4().simple().to_string();
        document.assign(&key, self.server_time());
        let sequence = state.next_sequence();
        let doc = Versioned {
            key: key.clone(),
            version: 1,
            sequence,
            document,
        };

        let mut journal = Journal::new();
        journal.record_insert(collection, &doc);
        state
            .collections
            .entry(collection.clone())
            .or_default()
            .insert(key, doc.clone());
        self.applied(1);
        self.listeners.lock().publish(journal.commit());
        Ok(doc)
    }

    async fn get(&self, collection: &Collection, key: &str) -> Result<Option<Versioned>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn commit(
        &self,
        collection: &Collection,
        key: &str,
        expected_version: u64,
        document: Document,
    ) -> Result<CommitResult, StoreError> {
        tokio::task::yield_now().await;
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if self.take_forced_conflict() {
            let actual = state
                .collections
                .get(collection)
                .and_then(|docs| docs.get(key))
                .map(|doc| doc.version + 1);
            return Ok(CommitResult::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }
        if let Some(conflict) = state.check_version(collection, key, expected_version) {
            return Ok(conflict);
        }

        let mut journal = Journal::new();
        let sequence = state.replace(collection, key, document, &mut journal);
        self.applied(1);
        self.listeners.lock().publish(journal.commit());
        Ok(CommitResult::Committed { sequence })
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<CommitResult, StoreError> {
        tokio::task::yield_now().await;
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(write) = first_duplicate(&writes) {
            return Err(StoreError::Rejected {
                collection: write.collection.clone(),
                reason: format!("document {} written twice in one batch", write.key),
            });
        }
        let mut state = self.state.lock();
        if let Some(first) = writes.first() {
            if self.take_forced_conflict() {
                return Ok(CommitResult::VersionConflict {
                    key: first.key.clone(),
                    expected: first.expected_version,
                    actual: Some(first.expected_version + 1),
                });
            }
        }
        for write in &writes {
            if let Some(conflict) = state.check_version(&write.collection, &write.key, write.expected_version) {
                return Ok(conflict);
            }
        }

        let mut journal = Journal::new();
        let mut sequence = state.sequence;
        let count = writes.len();
        for write in writes {
            sequence = state.replace(&write.collection, &write.key, write.document, &mut journal);
        }
        self.applied(count);
        self.listeners.lock().publish(journal.commit());
        Ok(CommitResult::Committed { sequence })
    }

    async fn delete(&self, collection: &Collection, key: &str) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(key));
        let Some(removed) = removed else {
            return Ok(false);
        };

        let sequence = state.next_sequence();
        let mut journal = Journal::new();
        journal.record_delete(collection, key, removed.version + 1, sequence);
        self.applied(1);
        self.listeners.lock().publish(journal.commit());
        Ok(true)
    }

    async fn drop_collection(&self, collection: &Collection) -> Result<usize, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let removed = state.collections.remove(collection).unwrap_or_default();
        if removed.is_empty() {
            return Ok(0);
        }

        let mut journal = Journal::new();
        let mut docs: Vec<Versioned> = removed.into_values().collect();
        docs.sort_by(|a, b| a.key.cmp(&b.key));
        for doc in &docs {
            let sequence = state.next_sequence();
            journal.record_delete(collection, &doc.key, doc.version + 1, sequence);
        }
        self.applied(docs.len());
        self.listeners.lock().publish(journal.commit());
        debug!(collection = %collection, removed = docs.len(), "dropped collection");
        Ok(docs.len())
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<Versioned>, StoreError> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().sorted(collection))
    }

    fn watch(&self, collection: &Collection) -> Result<ChangeStream, StoreError> {
        {
            let mut faults = self.faults.lock();
            if faults.failing_watches > 0 {
                faults.failing_watches -= 1;
                return Err(StoreError::Unavailable(format!("cannot watch {}", collection)));
            }
        }

        // Snapshot and registration happen under the state lock so no commit
        // can slip between them.
        let state = self.state.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(StreamMessage::Snapshot {
            collection: collection.clone(),
            documents: state.sorted(collection),
        });
        let id = self.listeners.lock().add(collection, tx);
        drop(state);

        debug!(collection = %collection, listener = id, "opened change stream");
        let listeners = Arc::downgrade(&self.listeners);
        let watched = collection.clone();
        let guard = ListenerGuard::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().remove(&watched, id);
                debug!(collection = %watched, listener = id, "released change stream");
            }
        });
        Ok(ChangeStream::new(collection.clone(), rx, guard))
    }

    fn server_time(&self) -> Timestamp {
        let now = Self::now_millis();
        let mut prev = self.clock.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .clock
                .compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Timestamp::from_millis(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Returns the first write that targets a document already written earlier
/// in the same batch.
fn first_duplicate(writes: &[BatchWrite]) -> Option<&BatchWrite> {
    let mut seen = HashSet::new();
    writes
        .iter()
        .find(|write| !seen.insert((&write.collection, write.key.as_str())))
}
