//! Query descriptors.
//!
//! A descriptor names a live view: which collection it watches and which of
//! its documents belong in the view. Two subscriptions with equal descriptors
//! share one store stream.

use agora_core::{PollId, UserId};
use agora_storage::{Collection, Document};
use core::fmt;

/// A live view over the store, ordered by recency.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryDescriptor {
    /// Every poll.
    AllPolls,
    /// Notifications addressed to one user.
    Notifications { recipient: UserId },
    /// The comment thread of one poll.
    Comments { poll: PollId },
}

impl QueryDescriptor {
    /// Creates a notifications descriptor.
    pub fn notifications(recipient: impl Into<UserId>) -> Self {
        QueryDescriptor::Notifications {
            recipient: recipient.into(),
        }
    }

    /// Creates a comment thread descriptor.
    pub fn comments(poll: impl Into<PollId>) -> Self {
        QueryDescriptor::Comments { poll: poll.into() }
    }

    /// Returns the collection this view is fed from.
    pub fn collection(&self) -> Collection {
        match self {
            QueryDescriptor::AllPolls => Collection::Polls,
            QueryDescriptor::Notifications { .. } => Collection::Notifications,
            QueryDescriptor::Comments { poll } => Collection::comments_of(poll),
        }
    }

    /// Returns true if `document` belongs in this view.
    pub fn matches(&self, document: &Document) -> bool {
        match (self, document) {
            (QueryDescriptor::AllPolls, Document::Poll(_)) => true,
            (QueryDescriptor::Notifications { recipient }, Document::Notification(n)) => {
                &n.recipient == recipient
            }
            (QueryDescriptor::Comments { poll }, Document::Comment(c)) => &c.poll_id == poll,
            _ => false,
        }
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryDescriptor::AllPolls => f.write_str("all polls"),
            QueryDescriptor::Notifications { recipient } => write!(f, "notifications for {}", recipient),
            QueryDescriptor::Comments { poll } => write!(f, "comments on {}", poll),
        }
    }
}
