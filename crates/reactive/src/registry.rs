//! Subscription registry.
//!
//! The registry owns one feed per distinct `QueryDescriptor`. A feed holds the
//! store-side listener, a reconciler, and the set of viewers. A single tokio
//! task drains the feed's stream, reconciles each message and hands the
//! result to every viewer, so viewers of one descriptor share one stream.
//!
//! The store listener is released exactly once, when the last viewer of a
//! descriptor leaves.

use crate::change_set::ChangeSet;
use crate::query::QueryDescriptor;
use crate::reconciler::ChangeFeedReconciler;
use crate::snapshot::Snapshot;
use agora_core::{Error, Result};
use agora_storage::{DocumentStore, ListenerGuard, StoreError, StreamMessage};
use core::cell::Cell;
use core::fmt;
use hashbrown::HashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for feed events.
pub type FeedCallback = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

/// What a viewer receives.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    /// A new snapshot was published.
    Updated(ChangeSet),
    /// The stream failed. `snapshot` is the last good state, flagged as
    /// degraded; a reconnect is under way.
    Degraded { error: Error, snapshot: Arc<Snapshot> },
}

impl FeedEvent {
    /// Returns the snapshot this event carries.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            FeedEvent::Updated(changes) => &changes.current,
            FeedEvent::Degraded { snapshot, .. } => snapshot,
        }
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.snapshot().revision()
    }
}

/// How a failed stream is re-established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before the feed stays degraded for good.
    pub max_attempts: u32,
    /// Delay before the first attempt; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Identifies a subscription for `unsubscribe`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    descriptor: QueryDescriptor,
}

impl SubscriptionHandle {
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }
}

struct Subscriber {
    active: AtomicBool,
    /// Held while the callback runs; stores the last delivered revision.
    /// Reentrant so a callback may unsubscribe itself.
    gate: ReentrantMutex<Cell<u64>>,
    callback: FeedCallback,
}

impl Subscriber {
    fn new(callback: FeedCallback) -> Self {
        Self {
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(Cell::new(0)),
            callback,
        }
    }

    fn deliver(&self, event: &FeedEvent) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let delivered = self.gate.lock();
        if !self.active.load(Ordering::SeqCst) || event.revision() <= delivered.get() {
            return;
        }
        delivered.set(event.revision());
        (self.callback)(event);
    }

    /// Deactivates and waits out any callback in flight.
    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        drop(self.gate.lock());
    }
}

struct Feed {
    descriptor: QueryDescriptor,
    reconciler: Mutex<ChangeFeedReconciler>,
    subscribers: Mutex<HashMap<SubscriptionId, Arc<Subscriber>>>,
    listener: Mutex<Option<ListenerGuard>>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// False once the task gave up reconnecting.
    streaming: AtomicBool,
    closed: AtomicBool,
}

impl Feed {
    fn new(descriptor: QueryDescriptor, listener: ListenerGuard) -> Self {
        Self {
            reconciler: Mutex::new(ChangeFeedReconciler::new(descriptor.clone())),
            descriptor,
            subscribers: Mutex::new(HashMap::new()),
            listener: Mutex::new(Some(listener)),
            task: Mutex::new(None),
            streaming: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    fn latest(&self) -> Option<Arc<Snapshot>> {
        let reconciler = self.reconciler.lock();
        reconciler.is_primed().then(|| reconciler.snapshot())
    }

    fn apply(&self, message: StreamMessage) {
        let changes = {
            let mut reconciler = self.reconciler.lock();
            match message {
                StreamMessage::Snapshot { documents, .. } => reconciler.apply_snapshot(&documents),
                StreamMessage::Changes(batch) => reconciler.apply_batch(&batch),
                StreamMessage::Error(_) => None,
            }
        };
        if let Some(changes) = changes {
            self.broadcast(&FeedEvent::Updated(changes));
        }
    }

    fn fail(&self, error: Error) {
        let snapshot = self.reconciler.lock().fail();
        self.broadcast(&FeedEvent::Degraded { error, snapshot });
    }

    fn broadcast(&self, event: &FeedEvent) {
        let subscribers: Vec<Arc<Subscriber>> = self.subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            subscriber.deliver(event);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Starts the task draining `receiver`.
    fn start(
        self: &Arc<Self>,
        receiver: UnboundedReceiver<StreamMessage>,
        store: Arc<dyn DocumentStore>,
        policy: ReconnectPolicy,
        runtime: &Handle,
    ) {
        self.streaming.store(true, Ordering::SeqCst);
        let task = runtime.spawn(run_feed(self.clone(), store, policy, receiver));
        *self.task.lock() = Some(task);
    }

    /// Opens a fresh stream, unless the feed was torn down meanwhile.
    fn rewatch(&self, store: &dyn DocumentStore) -> core::result::Result<Option<UnboundedReceiver<StreamMessage>>, StoreError> {
        let mut listener = self.listener.lock();
        if self.is_closed() {
            return Ok(None);
        }
        let (receiver, guard) = store.watch(&self.descriptor.collection())?.into_parts();
        *listener = Some(guard);
        Ok(Some(receiver))
    }

    async fn reconnect(
        &self,
        store: &dyn DocumentStore,
        policy: ReconnectPolicy,
    ) -> Option<UnboundedReceiver<StreamMessage>> {
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(policy.backoff * attempt).await;
            match self.rewatch(store) {
                Ok(Some(receiver)) => {
                    debug!(feed = %self.descriptor, attempt, "change stream re-established");
                    return Some(receiver);
                }
                Ok(None) => return None,
                Err(err) => warn!(feed = %self.descriptor, attempt, error = %err, "reconnect failed"),
            }
        }
        warn!(feed = %self.descriptor, "giving up on change stream; serving last snapshot");
        None
    }

    /// Releases the store listener and stops the feed task.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let listener = self.listener.lock().take();
        drop(listener);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        debug!(feed = %self.descriptor, "feed closed");
    }
}

async fn run_feed(
    feed: Arc<Feed>,
    store: Arc<dyn DocumentStore>,
    policy: ReconnectPolicy,
    mut receiver: UnboundedReceiver<StreamMessage>,
) {
    loop {
        let error = match receiver.recv().await {
            Some(StreamMessage::Error(err)) => Error::from(err),
            Some(message) => {
                feed.apply(message);
                continue;
            }
            None => Error::stream(format!("change stream for {} ended", feed.descriptor)),
        };
        if feed.is_closed() {
            return;
        }
        warn!(feed = %feed.descriptor, error = %error, "change stream failed");
        feed.fail(error);
        match feed.reconnect(store.as_ref(), policy).await {
            Some(next) => receiver = next,
            None => {
                feed.streaming.store(false, Ordering::SeqCst);
                return;
            }
        }
    }
}

struct RegistryInner {
    store: Arc<dyn DocumentStore>,
    policy: ReconnectPolicy,
    feeds: Mutex<HashMap<QueryDescriptor, Arc<Feed>>>,
    next_id: AtomicU64,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for (_, feed) in self.feeds.get_mut().drain() {
            feed.close();
        }
    }
}

/// Tracks viewers and multiplexes one store stream per descriptor.
///
/// Cloning is cheap; clones share the same feeds.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("feeds", &self.feed_count())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Creates a registry with the default reconnect policy.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_policy(store, ReconnectPolicy::default())
    }

    /// Creates a registry with a custom reconnect policy.
    pub fn with_policy(store: Arc<dyn DocumentStore>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                policy,
                feeds: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribes `callback` to a view.
    ///
    /// The callback receives the current snapshot right away if the view is
    /// already live, then every later snapshot in revision order. Must be
    /// called within a tokio runtime.
    pub fn subscribe<F>(&self, descriptor: QueryDescriptor, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| Error::stream("subscriptions require a running tokio runtime"))?;
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let subscriber = Arc::new(Subscriber::new(Arc::new(callback)));

        let feed = {
            let mut feeds = self.inner.feeds.lock();
            let feed = match feeds.get(&descriptor) {
                Some(feed) => {
                    if !feed.is_streaming() {
                        self.revive(feed, &runtime);
                    }
                    feed.clone()
                }
                None => {
                    let feed = self.open_feed(&descriptor, &runtime)?;
                    feeds.insert(descriptor.clone(), feed.clone());
                    feed
                }
            };
            feed.subscribers.lock().insert(id, subscriber.clone());
            feed
        };

        if let Some(current) = feed.latest() {
            subscriber.deliver(&FeedEvent::Updated(ChangeSet::initial(current)));
        }
        debug!(feed = %descriptor, subscription = id, "subscribed");
        Ok(SubscriptionHandle { id, descriptor })
    }

    /// Subscribes and returns a guard that unsubscribes when dropped.
    pub fn subscribe_guarded<F>(&self, descriptor: QueryDescriptor, callback: F) -> Result<SubscriptionGuard>
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        let handle = self.subscribe(descriptor, callback)?;
        Ok(SubscriptionGuard {
            registry: self.clone(),
            handle: Some(handle),
        })
    }

    /// Removes a subscription.
    ///
    /// Once this returns the callback is not invoked again. Returns false if
    /// the subscription was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let (subscriber, emptied) = {
            let mut feeds = self.inner.feeds.lock();
            let Some(feed) = feeds.get(&handle.descriptor).cloned() else {
                return false;
            };
            let mut subscribers = feed.subscribers.lock();
            let Some(subscriber) = subscribers.remove(&handle.id) else {
                return false;
            };
            let last = subscribers.is_empty();
            drop(subscribers);
            if last {
                feeds.remove(&handle.descriptor);
            }
            (subscriber, last.then_some(feed))
        };

        subscriber.deactivate();
        if let Some(feed) = emptied {
            feed.close();
        }
        debug!(feed = %handle.descriptor, subscription = handle.id, "unsubscribed");
        true
    }

    /// Returns the current snapshot of a live view.
    pub fn snapshot(&self, descriptor: &QueryDescriptor) -> Option<Arc<Snapshot>> {
        let feed = self.inner.feeds.lock().get(descriptor).cloned();
        feed.and_then(|feed| feed.latest())
    }

    /// Returns the number of viewers of a descriptor.
    pub fn subscriber_count(&self, descriptor: &QueryDescriptor) -> usize {
        self.inner
            .feeds
            .lock()
            .get(descriptor)
            .map_or(0, |feed| feed.subscribers.lock().len())
    }

    /// Returns the number of open feeds.
    pub fn feed_count(&self) -> usize {
        self.inner.feeds.lock().len()
    }

    /// Returns true if the view is live and its stream is up, or being
    /// re-established.
    pub fn is_streaming(&self, descriptor: &QueryDescriptor) -> bool {
        self.inner
            .feeds
            .lock()
            .get(descriptor)
            .is_some_and(|feed| feed.is_streaming())
    }

    fn open_feed(&self, descriptor: &QueryDescriptor, runtime: &Handle) -> Result<Arc<Feed>> {
        let (mut receiver, guard) = self.inner.store.watch(&descriptor.collection())?.into_parts();
        let feed = Arc::new(Feed::new(descriptor.clone(), guard));

        // The initial snapshot is usually queued already; reconcile it here so
        // the first viewer gets it without waiting on the task.
        if let Ok(message) = receiver.try_recv() {
            feed.apply(message);
        }
        feed.start(receiver, self.inner.store.clone(), self.inner.policy, runtime);
        info!(feed = %descriptor, "feed opened");
        Ok(feed)
    }

    /// Tries once to reopen the stream of a feed that gave up reconnecting.
    /// On failure the feed keeps serving its degraded snapshot. The fresh
    /// snapshot is reconciled by the task, outside the registry lock.
    fn revive(&self, feed: &Arc<Feed>, runtime: &Handle) {
        match feed.rewatch(self.inner.store.as_ref()) {
            Ok(Some(receiver)) => {
                feed.start(receiver, self.inner.store.clone(), self.inner.policy, runtime);
                info!(feed = %feed.descriptor, "feed revived");
            }
            Ok(None) => {}
            Err(err) => warn!(feed = %feed.descriptor, error = %err, "feed still disconnected"),
        }
    }
}

/// Unsubscribes when dropped.
pub struct SubscriptionGuard {
    registry: SubscriptionRegistry,
    handle: Option<SubscriptionHandle>,
}

impl SubscriptionGuard {
    /// Returns the underlying handle.
    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// Unsubscribes now.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => self.registry.unsubscribe(&handle),
            None => false,
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("handle", &self.handle)
            .finish()
    }
}
