//! Immutable snapshots of a live view.

use crate::query::QueryDescriptor;
use agora_core::model::{Comment, Notification, Poll};
use agora_storage::Versioned;
use std::sync::Arc;

/// The complete contents of a view at one revision, newest first.
///
/// Snapshots are never mutated after publication. Each reconciled batch
/// produces a new one, so a viewer holding an `Arc<Snapshot>` always sees a
/// whole batch or none of it.
#[derive(Clone, Debug)]
pub struct Snapshot {
    descriptor: QueryDescriptor,
    entries: Vec<Arc<Versioned>>,
    revision: u64,
    degraded: bool,
}

impl Snapshot {
    /// Creates an empty snapshot at revision 0.
    pub fn empty(descriptor: QueryDescriptor) -> Self {
        Self::new(descriptor, Vec::new(), 0, false)
    }

    pub(crate) fn new(
        descriptor: QueryDescriptor,
        entries: Vec<Arc<Versioned>>,
        revision: u64,
        degraded: bool,
    ) -> Self {
        Self {
            descriptor,
            entries,
            revision,
            degraded,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Returns the revision. Revisions grow by one per published snapshot.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if the backing stream failed after this view was built.
    /// The contents are the last good state.
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries, newest first.
    #[inline]
    pub fn entries(&self) -> &[Arc<Versioned>] {
        &self.entries
    }

    /// Looks up an entry by document key.
    pub fn get(&self, key: &str) -> Option<&Arc<Versioned>> {
        self.entries.iter().find(|doc| doc.key == key)
    }

    /// Returns the polls in the view.
    pub fn polls(&self) -> impl Iterator<Item = &Poll> + '_ {
        self.entries.iter().filter_map(|doc| doc.document.as_poll())
    }

    /// Returns the comments in the view.
    pub fn comments(&self) -> impl Iterator<Item = &Comment> + '_ {
        self.entries.iter().filter_map(|doc| doc.document.as_comment())
    }

    /// Returns the notifications in the view.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> + '_ {
        self.entries
            .iter()
            .filter_map(|doc| doc.document.as_notification())
    }

    /// Counts unread notifications in the view.
    pub fn unread_count(&self) -> usize {
        self.notifications().filter(|n| !n.read).count()
    }
}
