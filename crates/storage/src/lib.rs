//! Agora Storage - Backing document store for the Agora polling engine.
//!
//! This crate defines the seam between Agora and the document store it runs
//! on, plus an in-memory store that honours the same contract:
//!
//! - `DocumentStore`: async trait for versioned reads, optimistic commits,
//!   atomic batches, deletes and push-based change streams
//! - `Collection` / `Document` / `Versioned`: what the store holds
//! - `DocTransaction`: single-document optimistic transaction
//! - `CommitResult`: tagged outcome of a conditional commit
//! - `Journal` / `ChangeBatch`: change events emitted by each commit
//! - `ChangeStream`: a live listener; dropping it releases the listener
//! - `MemoryStore`: in-process store with fault injection for tests
//!
//! # Example
//!
//! ```rust
//! use agora_core::model::PollDraft;
//! use agora_core::{PollId, Timestamp};
//! use agora_storage::{Collection, CommitResult, DocTransaction, Document, DocumentStore, MemoryStore};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let store = MemoryStore::new();
//! let poll = PollDraft::poll("Coffee or tea?", ["Coffee", "Tea"])
//!     .into_poll(PollId::default(), None, Timestamp::UNSET);
//! let stored = store.insert(&Collection::Polls, Document::Poll(poll)).await.unwrap();
//! assert_eq!(stored.version, 1);
//!
//! let mut tx = DocTransaction::begin(&store, &Collection::Polls, &stored.key)
//!     .await
//!     .unwrap()
//!     .unwrap();
//! let next = tx.document().clone();
//! assert!(matches!(tx.commit(next).await.unwrap(), CommitResult::Committed { .. }));
//! # });
//! ```

mod backend;
mod collection;
mod document;
mod error;
pub mod journal;
pub mod memory;
mod stream;
pub mod transaction;

pub use backend::DocumentStore;
pub use collection::Collection;
pub use document::{Document, Versioned};
pub use error::StoreError;
pub use journal::{ChangeBatch, ChangeEvent, ChangeKind, Journal};
pub use memory::MemoryStore;
pub use stream::{ChangeStream, ListenerGuard, StreamMessage};
pub use transaction::{BatchWrite, CommitResult, DocTransaction, TransactionState};
