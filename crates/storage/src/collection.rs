//! Collections held by the document store.

use agora_core::PollId;
use core::fmt;

/// A named collection of documents.
///
/// Comments live in a sub-collection per poll, mirroring how the store nests
/// them under the poll document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Polls,
    Comments(PollId),
    Notifications,
}

impl Collection {
    /// Returns the comment sub-collection of a poll.
    pub fn comments_of(poll: &PollId) -> Self {
        Collection::Comments(poll.clone())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Polls => f.write_str("polls"),
            Collection::Comments(poll) => write!(f, "polls/{}/comments", poll),
            Collection::Notifications => f.write_str("notifications"),
        }
    }
}
