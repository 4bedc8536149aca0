//! Optimistic transactions for the document store.
//!
//! A `DocTransaction` is scoped to a single document: it remembers the
//! version it read and commits only if nobody else committed in between.
//! There are no locks; the store's version check is the isolation.

use crate::backend::DocumentStore;
use crate::collection::Collection;
use crate::document::{Document, Versioned};
use crate::error::StoreError;

/// Outcome of a conditional commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitResult {
    /// The write was applied at the given store sequence.
    Committed { sequence: u64 },
    /// Another writer got there first. `actual` is `None` when the document
    /// was deleted.
    VersionConflict {
        key: String,
        expected: u64,
        actual: Option<u64>,
    },
}

impl CommitResult {
    /// Returns true if the write was applied.
    #[inline]
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::Committed { .. })
    }
}

/// One write inside an atomic batch.
#[derive(Clone, Debug)]
pub struct BatchWrite {
    pub collection: Collection,
    pub key: String,
    pub expected_version: u64,
    pub document: Document,
}

impl BatchWrite {
    /// Creates a write that replaces `current` if it is still current.
    pub fn replace(collection: Collection, current: &Versioned, document: Document) -> Self {
        Self {
            collection,
            key: current.key.clone(),
            expected_version: current.version,
            document,
        }
    }
}

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Read done, commit not attempted yet.
    Active,
    /// The commit was applied.
    Committed,
    /// The commit lost against a concurrent writer.
    Conflicted,
}

/// A single-document optimistic transaction.
pub struct DocTransaction<'s> {
    store: &'s dyn DocumentStore,
    collection: Collection,
    base: Versioned,
    state: TransactionState,
}

impl<'s> DocTransaction<'s> {
    /// Reads the current version of a document and opens a transaction on it.
    ///
    /// Returns `None` if the document does not exist.
    pub async fn begin(
        store: &'s dyn DocumentStore,
        collection: &Collection,
        key: &str,
    ) -> Result<Option<DocTransaction<'s>>, StoreError> {
        let base = store.get(collection, key).await?;
        Ok(base.map(|base| Self {
            store,
            collection: collection.clone(),
            base,
            state: TransactionState::Active,
        }))
    }

    /// Returns the document as read.
    #[inline]
    pub fn document(&self) -> &Document {
        &self.base.document
    }

    /// Returns the version the transaction is conditioned on.
    #[inline]
    pub fn base_version(&self) -> u64 {
        self.base.version
    }

    /// Returns the key of the document.
    #[inline]
    pub fn key(&self) -> &str {
        &self.base.key
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Commits `document` if the stored version is still the one read.
    ///
    /// A transaction commits at most once; afterwards `state()` tells how it
    /// ended and further commits are rejected without reaching the store.
    pub async fn commit(&mut self, document: Document) -> Result<CommitResult, StoreError> {
        if self.state != TransactionState::Active {
            return Err(StoreError::Rejected {
                collection: self.collection.clone(),
                reason: format!("transaction on {} already {:?}", self.base.key, self.state),
            });
        }
        let result = self
            .store
            .commit(&self.collection, &self.base.key, self.base.version, document)
            .await?;
        self.state = match result {
            CommitResult::Committed { .. } => TransactionState::Committed,
            CommitResult::VersionConflict { .. } => TransactionState::Conflicted,
        };
        Ok(result)
    }
}
