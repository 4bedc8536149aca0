//! Notification fan-out.
//!
//! Notifications are a side effect of comment writes. They are written after
//! the comment is persisted and are best effort: a failed notification write
//! is logged and never undoes the comment. Read state changes are
//! version-checked so concurrent readers never clobber each other.

use crate::retry::RetryPolicy;
use agora_core::model::{Author, Comment, Notification, NotificationKind, Poll};
use agora_core::{EntityKind, Error, NotificationId, Result, Timestamp, UserId};
use agora_storage::{BatchWrite, Collection, CommitResult, Document, DocumentStore, Versioned};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sender name used when the commenter has no display name.
pub const FALLBACK_SENDER_NAME: &str = "Someone";

/// Poll title used when the poll question is blank.
pub const FALLBACK_POLL_QUESTION: &str = "your poll";

/// Derives notifications from comment writes and manages read state.
#[derive(Clone)]
pub struct NotificationFanout {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl NotificationFanout {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Notifies the poll author about a new comment.
    ///
    /// Nothing is written for anonymous polls or when authors comment on
    /// their own poll. Failures are logged and swallowed. Returns the id of
    /// the written notification, if any.
    pub async fn on_comment(&self, poll: &Poll, comment: &Comment) -> Option<NotificationId> {
        let recipient = poll.author.as_ref()?.id.clone();
        if comment.author.id == recipient {
            return None;
        }

        let notification = Notification {
            id: NotificationId::default(),
            recipient,
            sender: Author {
                id: comment.author.id.clone(),
                display_name: Some(comment.author.name_or(FALLBACK_SENDER_NAME).to_string()),
                photo: comment.author.photo.clone(),
            },
            kind: NotificationKind::CommentOnYourPoll,
            poll_id: poll.id.clone(),
            poll_question: if poll.question.trim().is_empty() {
                FALLBACK_POLL_QUESTION.to_string()
            } else {
                poll.question.clone()
            },
            comment_id: comment.id.clone(),
            read: false,
            created_at: Timestamp::UNSET,
        };
        let recipient = notification.recipient.clone();

        match self
            .store
            .insert(&Collection::Notifications, Document::Notification(notification))
            .await
        {
            Ok(stored) => {
                debug!(poll = %poll.id, recipient = %recipient, notification = %stored.key, "notification written");
                Some(NotificationId::from(stored.key))
            }
            Err(err) => {
                warn!(poll = %poll.id, comment = %comment.id, recipient = %recipient, error = %err, "failed to write notification");
                None
            }
        }
    }

    /// Marks one notification as read.
    ///
    /// Returns false if it was already read, in which case nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// `NotFound` if the notification does not exist.
    pub async fn mark_read(&self, id: &NotificationId) -> Result<bool> {
        for attempt in 1..=self.retry.max_attempts() {
            let doc = self
                .store
                .get(&Collection::Notifications, id.as_str())
                .await?
                .ok_or_else(|| Error::not_found(EntityKind::Notification, id))?;
            let Some(next) = as_read(&doc) else {
                return Ok(false);
            };

            match self
                .store
                .commit(&Collection::Notifications, &doc.key, doc.version, next)
                .await?
            {
                CommitResult::Committed { .. } => return Ok(true),
                CommitResult::VersionConflict { .. } => {
                    debug!(notification = %id, attempt, "mark_read conflicted, retrying");
                    if !self.retry.backoff(attempt).await {
                        break;
                    }
                }
            }
        }
        Err(Error::conflict_exhausted(
            format!("notification {}", id),
            self.retry.max_attempts(),
        ))
    }

    /// Marks every unread notification of `recipient` as read in one atomic
    /// batch, returning how many were changed.
    ///
    /// Notifications created after the unread set was read are left alone.
    /// With nothing unread no write is issued.
    pub async fn mark_all_read(&self, recipient: &UserId) -> Result<usize> {
        for attempt in 1..=self.retry.max_attempts() {
            let writes: Vec<BatchWrite> = self
                .unread(recipient)
                .await?
                .iter()
                .filter_map(|doc| {
                    as_read(doc).map(|next| BatchWrite::replace(Collection::Notifications, doc, next))
                })
                .collect();
            if writes.is_empty() {
                return Ok(0);
            }

            let count = writes.len();
            match self.store.commit_batch(writes).await? {
                CommitResult::Committed { .. } => {
                    info!(recipient = %recipient, count, "marked notifications read");
                    return Ok(count);
                }
                CommitResult::VersionConflict { key, .. } => {
                    debug!(recipient = %recipient, attempt, conflict = %key, "mark_all_read conflicted, retrying");
                    if !self.retry.backoff(attempt).await {
                        break;
                    }
                }
            }
        }
        Err(Error::conflict_exhausted(
            format!("notifications of {}", recipient),
            self.retry.max_attempts(),
        ))
    }

    /// Counts unread notifications of `recipient`.
    pub async fn unread_count(&self, recipient: &UserId) -> Result<usize> {
        Ok(self.unread(recipient).await?.len())
    }

    /// Lists the notifications of `recipient`, newest first.
    pub async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        let docs = self.store.list(&Collection::Notifications).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match doc.document {
                Document::Notification(n) if &n.recipient == recipient => Some(n),
                _ => None,
            })
            .collect())
    }

    async fn unread(&self, recipient: &UserId) -> Result<Vec<Versioned>> {
        let docs = self.store.list(&Collection::Notifications).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| {
                doc.document
                    .as_notification()
                    .is_some_and(|n| &n.recipient == recipient && !n.read)
            })
            .collect())
    }
}

/// Returns the read version of an unread notification.
fn as_read(doc: &Versioned) -> Option<Document> {
    let notification = doc.document.as_notification()?;
    if notification.read {
        return None;
    }
    Some(Document::Notification(Notification {
        read: true,
        ..notification.clone()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::model::PollDraft;
    use agora_core::{CommentId, PollId};
    use agora_storage::MemoryStore;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, NotificationFanout) {
        let store = Arc::new(MemoryStore::new());
        let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
        (store.clone(), NotificationFanout::new(store, retry))
    }

    fn poll_by(author: Option<Author>, question: &str) -> Poll {
        PollDraft::poll(question, ["a", "b"]).into_poll(PollId::from("p1"), author, Timestamp::from_millis(1))
    }

    fn comment_by(author: Author) -> Comment {
        Comment {
            id: CommentId::from("c1"),
            poll_id: PollId::from("p1"),
            author,
            text: "nice".into(),
            created_at: Timestamp::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_comment_notifies_poll_author() {
        let (_, fanout) = setup();
        let poll = poll_by(Some(Author::new("u1", "Ana")), "Lunch?");
        let id = fanout
            .on_comment(&poll, &comment_by(Author::new("u2", "Bo")))
            .await
            .unwrap();

        let inbox = fanout.notifications_for(&UserId::from("u1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, id);
        assert_eq!(inbox[0].sender.name_or(""), "Bo");
        assert_eq!(inbox[0].poll_question, "Lunch?");
        assert!(!inbox[0].read);
    }

    #[tokio::test]
    async fn test_no_self_or_anonymous_notifications() {
        let (store, fanout) = setup();
        let ana = Author::new("u1", "Ana");
        assert!(fanout
            .on_comment(&poll_by(Some(ana.clone()), "Q"), &comment_by(ana.clone()))
            .await
            .is_none());
        assert!(fanout
            .on_comment(&poll_by(None, "Q"), &comment_by(ana))
            .await
            .is_none());
        assert!(store.is_empty(&Collection::Notifications));
    }

    #[tokio::test]
    async fn test_fallback_names() {
        let (_, fanout) = setup();
        let nameless = Author {
            id: UserId::from("u2"),
            display_name: None,
            photo: None,
        };
        fanout
            .on_comment(&poll_by(Some(Author::new("u1", "Ana")), " "), &comment_by(nameless))
            .await
            .unwrap();

        let inbox = fanout.notifications_for(&UserId::from("u1")).await.unwrap();
        assert_eq!(inbox[0].sender.display_name.as_deref(), Some(FALLBACK_SENDER_NAME));
        assert_eq!(inbox[0].poll_question, FALLBACK_POLL_QUESTION);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let (store, fanout) = setup();
        store.fail_next_inserts(Collection::Notifications, 1);
        let poll = poll_by(Some(Author::new("u1", "Ana")), "Q");
        assert!(fanout
            .on_comment(&poll, &comment_by(Author::new("u2", "Bo")))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_mark_read() {
        let (_, fanout) = setup();
        let poll = poll_by(Some(Author::new("u1", "Ana")), "Q");
        let id = fanout
            .on_comment(&poll, &comment_by(Author::new("u2", "Bo")))
            .await
            .unwrap();

        assert!(fanout.mark_read(&id).await.unwrap());
        assert!(!fanout.mark_read(&id).await.unwrap());
        assert_eq!(fanout.unread_count(&UserId::from("u1")).await.unwrap(), 0);

        let err = fanout.mark_read(&NotificationId::from("nope")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Notification, .. }));
    }

    #[tokio::test]
    async fn test_mark_all_read_twice() {
        let (store, fanout) = setup();
        let poll = poll_by(Some(Author::new("u1", "Ana")), "Q");
        for _ in 0..3 {
            fanout.on_comment(&poll, &comment_by(Author::new("u2", "Bo"))).await;
        }
        let other = poll_by(Some(Author::new("u3", "Cy")), "Q");
        fanout.on_comment(&other, &comment_by(Author::new("u2", "Bo"))).await;

        assert_eq!(fanout.mark_all_read(&UserId::from("u1")).await.unwrap(), 3);
        let writes = store.writes_applied();
        assert_eq!(fanout.mark_all_read(&UserId::from("u1")).await.unwrap(), 0);
        assert_eq!(store.writes_applied(), writes);

        // other recipients are untouched
        assert_eq!(fanout.unread_count(&UserId::from("u3")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_retries_conflicts() {
        let (store, fanout) = setup();
        let poll = poll_by(Some(Author::new("u1", "Ana")), "Q");
        fanout.on_comment(&poll, &comment_by(Author::new("u2", "Bo"))).await;

        store.force_conflicts(1);
        assert_eq!(fanout.mark_all_read(&UserId::from("u1")).await.unwrap(), 1);

        fanout.on_comment(&poll, &comment_by(Author::new("u2", "Bo"))).await;
        store.force_conflicts(3);
        let err = fanout.mark_all_read(&UserId::from("u1")).await.unwrap_err();
        assert!(matches!(err, Error::ConflictExhausted { .. }));
    }
}
