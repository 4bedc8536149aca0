//! Push-based change streams.

use crate::collection::Collection;
use crate::document::Versioned;
use crate::error::StoreError;
use crate::journal::ChangeBatch;
use core::fmt;
use tokio::sync::mpsc;

/// A message delivered on a change stream.
#[derive(Clone, Debug)]
pub enum StreamMessage {
    /// Full contents of the collection. Always the first message of a
    /// stream, so a listener starts from a complete view.
    Snapshot {
        collection: Collection,
        documents: Vec<Versioned>,
    },
    /// Changes made by one commit.
    Changes(ChangeBatch),
    /// End-of-life signal. No further messages follow.
    Error(StoreError),
}

/// Releases a store-side listener when dropped.
///
/// The release action runs at most once, whether the guard is dropped or
/// released explicitly.
pub struct ListenerGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    /// Creates a guard that runs `release` on drop.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Releases the listener now.
    pub fn release(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// A live subscription to one collection.
#[derive(Debug)]
pub struct ChangeStream {
    collection: Collection,
    receiver: mpsc::UnboundedReceiver<StreamMessage>,
    guard: ListenerGuard,
}

impl ChangeStream {
    /// Creates a stream from its receiving end and the guard that releases
    /// the store-side listener.
    pub fn new(
        collection: Collection,
        receiver: mpsc::UnboundedReceiver<StreamMessage>,
        guard: ListenerGuard,
    ) -> Self {
        Self {
            collection,
            receiver,
            guard,
        }
    }

    /// Returns the watched collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Waits for the next message. `None` means the store dropped the
    /// listener without an error signal.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        self.receiver.recv().await
    }

    /// Splits the stream so the listener can be released independently of
    /// whoever is reading messages.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<StreamMessage>, ListenerGuard) {
        (self.receiver, self.guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_guard_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let guard = ListenerGuard::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        guard.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        {
            let _guard = ListenerGuard::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
