//! Documents and their store-side version metadata.

use agora_core::model::{Comment, Notification, Poll};
use agora_core::{CommentId, NotificationId, PollId, Timestamp};

/// A document as held by the store.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Poll(Poll),
    Comment(Comment),
    Notification(Notification),
}

impl Document {
    /// Returns the document id, empty if the store has not assigned one.
    pub fn id(&self) -> &str {
        match self {
            Document::Poll(poll) => poll.id.as_str(),
            Document::Comment(comment) => comment.id.as_str(),
            Document::Notification(notification) => notification.id.as_str(),
        }
    }

    /// Returns the server-assigned creation time.
    pub fn created_at(&self) -> Timestamp {
        match self {
            Document::Poll(poll) => poll.created_at,
            Document::Comment(comment) => comment.created_at,
            Document::Notification(notification) => notification.created_at,
        }
    }

    /// Stamps the store-assigned id and creation time onto the document.
    pub fn assign(&mut self, id: &str, created_at: Timestamp) {
        match self {
            Document::Poll(poll) => {
                poll.id = PollId::from(id);
                poll.created_at = created_at;
            }
            Document::Comment(comment) => {
                comment.id = CommentId::from(id);
                comment.created_at = created_at;
            }
            Document::Notification(notification) => {
                notification.id = NotificationId::from(id);
                notification.created_at = created_at;
            }
        }
    }

    #[inline]
    pub fn as_poll(&self) -> Option<&Poll> {
        match self {
            Document::Poll(poll) => Some(poll),
            _ => None,
        }
    }

    #[inline]
    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Document::Comment(comment) => Some(comment),
            _ => None,
        }
    }

    #[inline]
    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            Document::Notification(notification) => Some(notification),
            _ => None,
        }
    }
}

/// A document together with its store-side version.
///
/// `version` starts at 1 on insert and grows by one on every committed write
/// to the same key; a delete is recorded at `version + 1`. `sequence` is the
/// store-wide commit sequence of the write that produced this version.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned {
    pub key: String,
    pub version: u64,
    pub sequence: u64,
    pub document: Document,
}

impl Versioned {
    /// Returns the creation time of the wrapped document.
    #[inline]
    pub fn created_at(&self) -> Timestamp {
        self.document.created_at()
    }
}
