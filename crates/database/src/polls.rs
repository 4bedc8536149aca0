//! Poll aggregate store.
//!
//! Owns the poll documents and the vote protocol. A vote is a single-document
//! optimistic transaction: read the poll at its current version, add one to
//! the chosen option, recompute the total, and commit only if nobody else
//! committed in between. Conflicts are retried with bounded backoff; no
//! client-side lock is ever taken.

use crate::identity::IdentityProvider;
use crate::retry::RetryPolicy;
use agora_core::model::{Poll, PollDraft};
use agora_core::{EntityKind, Error, OptionId, PollId, Result, Timestamp};
use agora_storage::{Collection, CommitResult, DocTransaction, Document, DocumentStore, Versioned};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates, votes on and deletes polls.
#[derive(Clone)]
pub struct PollAggregateStore {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    retry: RetryPolicy,
}

impl PollAggregateStore {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>, retry: RetryPolicy) -> Self {
        Self { store, identity, retry }
    }

    /// Creates a poll with zero votes, authored by the current caller.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty question or a poll with fewer than two
    /// options.
    pub async fn create_poll(&self, draft: PollDraft) -> Result<PollId> {
        draft.validate()?;
        let author = self.identity.current();
        let poll = draft.into_poll(PollId::default(), author, Timestamp::UNSET);
        let stored = self.store.insert(&Collection::Polls, Document::Poll(poll)).await?;
        let id = PollId::from(stored.key);
        info!(poll = %id, "poll created");
        Ok(id)
    }

    /// Adds one vote to `option` and returns the poll as committed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the poll or option does not exist, `ConflictExhausted`
    /// once every attempt lost against concurrent writers.
    pub async fn cast_vote(&self, poll_id: &PollId, option: &OptionId) -> Result<Poll> {
        let max_attempts = self.retry.max_attempts();
        for attempt in 1..=max_attempts {
            let mut tx = DocTransaction::begin(self.store.as_ref(), &Collection::Polls, poll_id.as_str())
                .await?
                .ok_or_else(|| Error::not_found(EntityKind::Poll, poll_id))?;
            let current = expect_poll(tx.document(), poll_id)?;
            let next = current
                .with_vote(option)
                .ok_or_else(|| Error::not_found(EntityKind::PollOption, option))?;

            match tx.commit(Document::Poll(next.clone())).await? {
                CommitResult::Committed { .. } => {
                    debug!(poll = %poll_id, option = %option, attempt, votes = next.votes, "vote committed");
                    return Ok(next);
                }
                CommitResult::VersionConflict { expected, actual, .. } => {
                    debug!(poll = %poll_id, attempt, expected, ?actual, "vote conflicted, retrying");
                    if !self.retry.backoff(attempt).await {
                        break;
                    }
                }
            }
        }
        warn!(poll = %poll_id, attempts = max_attempts, "vote gave up after repeated conflicts");
        Err(Error::conflict_exhausted(format!("poll {}", poll_id), max_attempts))
    }

    /// Deletes a poll and its comment thread. Deleting a missing poll is not
    /// an error.
    pub async fn delete_poll(&self, poll_id: &PollId) -> Result<()> {
        let comments = self.store.drop_collection(&Collection::comments_of(poll_id)).await?;
        let existed = self.store.delete(&Collection::Polls, poll_id.as_str()).await?;
        if existed {
            info!(poll = %poll_id, comments, "poll deleted");
        } else {
            debug!(poll = %poll_id, "poll already gone");
        }
        Ok(())
    }

    /// Fetches one poll.
    pub async fn get_poll(&self, poll_id: &PollId) -> Result<Poll> {
        let doc = self
            .store
            .get(&Collection::Polls, poll_id.as_str())
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Poll, poll_id))?;
        expect_poll(&doc.document, poll_id).cloned()
    }

    /// Lists every poll, newest first.
    pub async fn list_polls(&self) -> Result<Vec<Poll>> {
        let docs = self.store.list(&Collection::Polls).await?;
        Ok(docs.into_iter().filter_map(into_poll).collect())
    }
}

fn expect_poll<'d>(document: &'d Document, poll_id: &PollId) -> Result<&'d Poll> {
    document
        .as_poll()
        .ok_or_else(|| Error::store(format!("document {} in polls is not a poll", poll_id)))
}

fn into_poll(doc: Versioned) -> Option<Poll> {
    match doc.document {
        Document::Poll(poll) => Some(poll),
        _ => None,
    }
}
