//! The document store seam.

use crate::collection::Collection;
use crate::document::{Document, Versioned};
use crate::error::StoreError;
use crate::stream::ChangeStream;
use crate::transaction::{BatchWrite, CommitResult};
use agora_core::Timestamp;
use async_trait::async_trait;

/// Interface to the backing document store.
///
/// The store provides atomic single-document commits guarded by a version
/// check, atomic multi-document batches, push-based change streams and
/// server-assigned monotonic timestamps. Agora never locks on the client
/// side; every consistency guarantee comes from these primitives.
///
/// Implementations:
/// - `MemoryStore`: in-process store, used by tests and embedders
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document. The store assigns its key and creation time
    /// and returns it at version 1.
    async fn insert(&self, collection: &Collection, document: Document) -> Result<Versioned, StoreError>;

    /// Reads a document with its current version.
    ///
    /// Returns `None` if the document does not exist.
    async fn get(&self, collection: &Collection, key: &str) -> Result<Option<Versioned>, StoreError>;

    /// Replaces a document if its version is still `expected_version`.
    ///
    /// A document that changed or vanished since it was read yields
    /// `CommitResult::VersionConflict` and nothing is written.
    async fn commit(
        &self,
        collection: &Collection,
        key: &str,
        expected_version: u64,
        document: Document,
    ) -> Result<CommitResult, StoreError>;

    /// Applies all writes atomically, or none of them if any version check
    /// fails.
    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<CommitResult, StoreError>;

    /// Deletes a document. Returns false if it did not exist.
    async fn delete(&self, collection: &Collection, key: &str) -> Result<bool, StoreError>;

    /// Deletes every document in a collection, returning how many were
    /// removed.
    async fn drop_collection(&self, collection: &Collection) -> Result<usize, StoreError>;

    /// Lists a collection ordered by creation time, newest first.
    async fn list(&self, collection: &Collection) -> Result<Vec<Versioned>, StoreError>;

    /// Opens a change stream on a collection. The first message is a full
    /// snapshot; later messages are change batches in commit order.
    fn watch(&self, collection: &Collection) -> Result<ChangeStream, StoreError>;

    /// Returns a server timestamp strictly greater than any handed out before.
    fn server_time(&self) -> Timestamp;
}
