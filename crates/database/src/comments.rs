//! Comment write path.

use crate::identity::IdentityProvider;
use crate::notifications::NotificationFanout;
use crate::polls::PollAggregateStore;
use agora_core::model::{Author, Comment};
use agora_core::{CommentId, Error, PollId, Result, Timestamp};
use agora_storage::{Collection, Document, DocumentStore};
use std::sync::Arc;
use tracing::debug;

/// Author name used when the commenter has no display name.
pub const FALLBACK_AUTHOR_NAME: &str = "Anonymous";

/// Persists comments and triggers their notifications.
#[derive(Clone)]
pub struct CommentWriter {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    polls: PollAggregateStore,
    fanout: NotificationFanout,
}

impl CommentWriter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        polls: PollAggregateStore,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            store,
            identity,
            polls,
            fanout,
        }
    }

    /// Posts a comment as the current caller.
    ///
    /// Once the comment is stored the poll author is notified, best effort;
    /// a failed notification never fails the post.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` for guests, `Validation` for blank text, `NotFound`
    /// if the poll does not exist.
    pub async fn post_comment(&self, poll_id: &PollId, text: &str) -> Result<Comment> {
        let caller = self
            .identity
            .current()
            .ok_or_else(|| Error::unauthenticated("post a comment"))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("comment text must not be empty"));
        }
        let poll = self.polls.get_poll(poll_id).await?;

        let comment = Comment {
            id: CommentId::default(),
            poll_id: poll_id.clone(),
            author: Author {
                display_name: Some(caller.name_or(FALLBACK_AUTHOR_NAME).to_string()),
                ..caller
            },
            text: text.to_string(),
            created_at: Timestamp::UNSET,
        };
        let stored = self
            .store
            .insert(&Collection::comments_of(poll_id), Document::Comment(comment))
            .await?;
        let comment = match stored.document {
            Document::Comment(comment) => comment,
            _ => return Err(Error::store("comment insert returned another document kind")),
        };
        debug!(poll = %poll_id, comment = %comment.id, "comment posted");

        self.fanout.on_comment(&poll, &comment).await;
        Ok(comment)
    }

    /// Lists the comments of a poll, newest first.
    pub async fn comments(&self, poll_id: &PollId) -> Result<Vec<Comment>> {
        let docs = self.store.list(&Collection::comments_of(poll_id)).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match doc.document {
                Document::Comment(comment) => Some(comment),
                _ => None,
            })
            .collect())
    }
}
