//! Agora - Main entry point for Agora operations.
//!
//! This module provides the `Agora` struct which is the primary interface
//! for creating polls, voting, commenting, watching live feeds, and managing
//! notifications.

use crate::builder::AgoraBuilder;
use crate::comments::CommentWriter;
use crate::config::AgoraConfig;
use crate::identity::IdentityProvider;
use crate::notifications::NotificationFanout;
use crate::polls::PollAggregateStore;
use agora_core::model::{Comment, Notification, Poll, PollDraft};
use agora_core::{Error, NotificationId, OptionId, PollId, Result, UserId};
use agora_geo::{authored_by, FeedStats, RankQuery, Ranked};
use agora_reactive::{
    FeedEvent, QueryDescriptor, Snapshot, SubscriptionGuard, SubscriptionHandle, SubscriptionRegistry,
};
use agora_storage::DocumentStore;
use std::sync::Arc;

/// The main Agora interface.
///
/// Provides methods for:
/// - Creating, voting on and deleting polls
/// - Posting comments
/// - Live subscriptions to polls, comment threads and notifications
/// - Notification read state
/// - Proximity-ranked feeds
///
/// Cloning is cheap; clones share the store and live feeds.
#[derive(Clone)]
pub struct Agora {
    config: Arc<AgoraConfig>,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    polls: PollAggregateStore,
    comments: CommentWriter,
    notifications: NotificationFanout,
    registry: SubscriptionRegistry,
}

impl Agora {
    /// Returns a builder.
    pub fn builder() -> AgoraBuilder {
        AgoraBuilder::new()
    }

    pub(crate) fn assemble(
        config: AgoraConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let retry = config.retry_policy();
        let polls = PollAggregateStore::new(store.clone(), identity.clone(), retry);
        let notifications = NotificationFanout::new(store.clone(), retry);
        let comments = CommentWriter::new(store.clone(), identity.clone(), polls.clone(), notifications.clone());
        let registry = SubscriptionRegistry::with_policy(store.clone(), config.reconnect_policy());
        Self {
            config: Arc::new(config),
            store,
            identity,
            polls,
            comments,
            notifications,
            registry,
        }
    }

    #[inline]
    pub fn config(&self) -> &AgoraConfig {
        &self.config
    }

    /// Returns the backing store.
    #[inline]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // Polls

    /// Creates a poll authored by the current caller.
    pub async fn create_poll(&self, draft: PollDraft) -> Result<PollId> {
        self.polls.create_poll(draft).await
    }

    /// Casts one vote. See `PollAggregateStore::cast_vote`.
    pub async fn cast_vote(&self, poll_id: &PollId, option: &OptionId) -> Result<Poll> {
        self.polls.cast_vote(poll_id, option).await
    }

    /// Deletes a poll and its comments. Idempotent.
    pub async fn delete_poll(&self, poll_id: &PollId) -> Result<()> {
        self.polls.delete_poll(poll_id).await
    }

    pub async fn get_poll(&self, poll_id: &PollId) -> Result<Poll> {
        self.polls.get_poll(poll_id).await
    }

    // Comments

    /// Posts a comment as the current caller and notifies the poll author.
    pub async fn post_comment(&self, poll_id: &PollId, text: &str) -> Result<Comment> {
        self.comments.post_comment(poll_id, text).await
    }

    /// Lists a poll's comments, newest first.
    pub async fn comments(&self, poll_id: &PollId) -> Result<Vec<Comment>> {
        self.comments.comments(poll_id).await
    }

    // Live views

    /// Subscribes to a live view.
    pub fn subscribe<F>(&self, descriptor: QueryDescriptor, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe(descriptor, callback)
    }

    /// Subscribes to a live view until the returned guard is dropped.
    pub fn subscribe_guarded<F>(&self, descriptor: QueryDescriptor, callback: F) -> Result<SubscriptionGuard>
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe_guarded(descriptor, callback)
    }

    /// Ends a subscription. Returns false if it had already ended.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.registry.unsubscribe(handle)
    }

    /// Returns the current snapshot of a live view, if anyone is watching it.
    pub fn snapshot(&self, descriptor: &QueryDescriptor) -> Option<Arc<Snapshot>> {
        self.registry.snapshot(descriptor)
    }

    #[inline]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // Notifications

    pub async fn mark_read(&self, id: &NotificationId) -> Result<bool> {
        self.notifications.mark_read(id).await
    }

    pub async fn mark_all_read(&self, recipient: &UserId) -> Result<usize> {
        self.notifications.mark_all_read(recipient).await
    }

    /// Counts unread notifications, from the live view when one is open.
    pub async fn unread_count(&self, recipient: &UserId) -> Result<usize> {
        let live = self
            .registry
            .snapshot(&QueryDescriptor::notifications(recipient.clone()))
            .filter(|snapshot| !snapshot.is_degraded());
        match live {
            Some(snapshot) => Ok(snapshot.unread_count()),
            None => self.notifications.unread_count(recipient).await,
        }
    }

    pub async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        self.notifications.notifications_for(recipient).await
    }

    // Feeds

    /// Returns the viewer's default feed query.
    pub fn default_query(&self) -> RankQuery {
        RankQuery::around(self.config.default_origin.clone()).radius_km(self.config.default_radius_km)
    }

    /// Ranks polls around the query origin.
    ///
    /// Uses the live poll view when one is open, otherwise reads the store.
    pub async fn nearby(&self, query: &RankQuery) -> Result<Vec<Ranked<Poll>>> {
        Ok(query.apply(self.all_polls().await?))
    }

    /// Dashboard numbers for a feed query.
    pub async fn feed_stats(&self, query: &RankQuery) -> Result<FeedStats> {
        Ok(FeedStats::of_ranked(&self.nearby(query).await?))
    }

    /// Lists the current caller's polls, newest first.
    pub async fn my_polls(&self) -> Result<Vec<Poll>> {
        let caller = self
            .identity
            .current()
            .ok_or_else(|| Error::unauthenticated("list your polls"))?;
        Ok(authored_by(self.all_polls().await?, &caller.id))
    }

    async fn all_polls(&self) -> Result<Vec<Poll>> {
        match self.registry.snapshot(&QueryDescriptor::AllPolls) {
            Some(snapshot) => Ok(snapshot.polls().cloned().collect()),
            None => self.polls.list_polls().await,
        }
    }
}

impl core::fmt::Debug for Agora {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Agora")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
