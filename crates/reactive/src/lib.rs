//! Agora Reactive - Live change feeds and subscriptions for Agora.
//!
//! This crate turns the push-based change streams of the document store into
//! consistent, recency-ordered views and routes them to viewers. When
//! underlying documents change, subscribers are notified with the new
//! snapshot and the incremental changes (additions, removals, modifications).
//!
//! # Core Concepts
//!
//! - `QueryDescriptor`: Names a live view (all polls, a user's notifications,
//!   a poll's comments)
//! - `Snapshot`: Immutable contents of a view at one revision
//! - `ChangeSet`: Changes between two snapshots
//! - `ChangeFeedReconciler`: Applies change batches to a sorted index
//! - `SubscriptionRegistry`: Shares one store stream per descriptor among
//!   all of its viewers
//!
//! # Example
//!
//! ```rust
//! use agora_reactive::{FeedEvent, QueryDescriptor, SubscriptionRegistry};
//! use agora_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let registry = SubscriptionRegistry::new(Arc::new(MemoryStore::new()));
//!
//! let handle = registry
//!     .subscribe(QueryDescriptor::AllPolls, |event: &FeedEvent| {
//!         println!("{} polls", event.snapshot().len());
//!     })
//!     .unwrap();
//!
//! assert_eq!(registry.feed_count(), 1);
//! assert!(registry.unsubscribe(&handle));
//! assert!(!registry.unsubscribe(&handle));
//! # });
//! ```

pub mod change_set;
mod query;
pub mod reconciler;
pub mod registry;
mod snapshot;

pub use change_set::ChangeSet;
pub use query::QueryDescriptor;
pub use reconciler::ChangeFeedReconciler;
pub use registry::{
    FeedCallback, FeedEvent, ReconnectPolicy, SubscriptionGuard, SubscriptionHandle, SubscriptionId,
    SubscriptionRegistry,
};
pub use snapshot::Snapshot;
