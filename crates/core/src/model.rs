//! Document model: polls, options, comments and notifications.

use crate::error::{Error, Result};
use crate::ids::{CommentId, NotificationId, OptionId, PollId, UserId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Category assigned when a draft does not name one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Minimum number of options for a `PollKind::Poll` draft.
pub const MIN_POLL_OPTIONS: usize = 2;

/// Whether a post collects votes or only comments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollKind {
    #[default]
    Poll,
    Question,
}

/// Identity of a poll, comment or notification author.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub display_name: Option<String>,
    pub photo: Option<String>,
}

impl Author {
    /// Creates an author with a display name and no photo.
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(display_name.into()),
            photo: None,
        }
    }

    /// Sets the photo reference.
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Returns the display name, or `fallback` when none is set.
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(fallback)
    }
}

/// Where a poll was asked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

impl Location {
    pub fn new(lat: f64, lng: f64, name: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            name: name.into(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(37.7749, -122.4194, "San Francisco, CA")
    }
}

/// A single answer within a poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    /// Never decreases; votes cannot be retracted.
    pub count: u64,
}

/// A poll or open question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub kind: PollKind,
    pub category: String,
    pub options: Vec<PollOption>,
    /// Denormalized sum of option counts, kept in step by the vote protocol.
    pub votes: u64,
    pub author: Option<Author>,
    pub location: Location,
    pub created_at: Timestamp,
}

impl Poll {
    /// Returns the option with the given id.
    pub fn option(&self, id: &OptionId) -> Option<&PollOption> {
        self.options.iter().find(|opt| &opt.id == id)
    }

    /// Sums the per-option counts.
    pub fn tally(&self) -> u64 {
        self.options.iter().map(|opt| opt.count).sum()
    }

    /// Returns true if the denormalized vote total matches the option counts.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.votes == self.tally()
    }

    /// Returns a copy of this poll with one more vote on `option`, and `votes`
    /// recomputed from the option counts.
    ///
    /// Returns `None` if the poll has no such option.
    pub fn with_vote(&self, option: &OptionId) -> Option<Poll> {
        self.option(option)?;
        let mut next = self.clone();
        for opt in next.options.iter_mut() {
            if &opt.id == option {
                opt.count += 1;
            }
        }
        next.votes = next.tally();
        Some(next)
    }

    /// Returns true if `user` authored this poll.
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        self.author.as_ref().is_some_and(|a| &a.id == user)
    }
}

/// Input for creating a poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub kind: PollKind,
    pub category: Option<String>,
    pub options: Vec<String>,
    pub location: Location,
}

impl PollDraft {
    /// Creates a draft for a poll with the given options.
    pub fn poll<I, S>(question: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question: question.into(),
            kind: PollKind::Poll,
            category: None,
            options: options.into_iter().map(Into::into).collect(),
            location: Location::default(),
        }
    }

    /// Creates a draft for an open question without options.
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            kind: PollKind::Question,
            category: None,
            options: Vec::new(),
            location: Location::default(),
        }
    }

    /// Sets the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the location.
    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Checks the draft can become a poll.
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::validation("question text must not be empty"));
        }
        if self.kind == PollKind::Poll && self.options.len() < MIN_POLL_OPTIONS {
            return Err(Error::validation(format!(
                "a poll needs at least {} options, got {}",
                MIN_POLL_OPTIONS,
                self.options.len()
            )));
        }
        Ok(())
    }

    /// Turns the draft into a poll with zero votes.
    ///
    /// Options get ids `opt-0`, `opt-1`, ... in draft order. Questions carry
    /// no options. A missing or blank category becomes [`DEFAULT_CATEGORY`].
    pub fn into_poll(self, id: PollId, author: Option<Author>, created_at: Timestamp) -> Poll {
        let options = match self.kind {
            PollKind::Poll => self
                .options
                .into_iter()
                .enumerate()
                .map(|(i, text)| PollOption {
                    id: OptionId::for_index(i),
                    text,
                    count: 0,
                })
                .collect(),
            PollKind::Question => Vec::new(),
        };
        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Poll {
            id,
            question: self.question,
            kind: self.kind,
            category,
            options,
            votes: 0,
            author,
            location: self.location,
            created_at,
        }
    }
}

/// A comment under a poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub poll_id: PollId,
    pub author: Author,
    pub text: String,
    pub created_at: Timestamp,
}

/// What triggered a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CommentOnYourPoll,
}

/// An advisory record addressed to one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub sender: Author,
    pub kind: NotificationKind,
    pub poll_id: PollId,
    pub poll_question: String,
    pub comment_id: CommentId,
    pub read: bool,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_poll() -> Poll {
        PollDraft::poll("Lunch?", ["Tacos", "Pho", "Salad"]).into_poll(
            PollId::from("p1"),
            Some(Author::new("u1", "Ana")),
            Timestamp::from_millis(10),
        )
    }

    #[test]
    fn test_draft_validation() {
        assert!(PollDraft::poll("  ", ["a", "b"]).validate().is_err());
        assert!(PollDraft::poll("Why?", ["only one"]).validate().is_err());
        assert!(PollDraft::poll("Why?", ["a", "b"]).validate().is_ok());
        assert!(PollDraft::question("Anyone around?").validate().is_ok());
    }

    #[test]
    fn test_into_poll_assigns_option_ids() {
        let poll = sample_poll();
        let ids: Vec<_> = poll.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["opt-0", "opt-1", "opt-2"]);
        assert_eq!(poll.votes, 0);
        assert_eq!(poll.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_question_drops_options() {
        let mut draft = PollDraft::question("Where is the parade?");
        draft.options = vec!["ignored".into()];
        let poll = draft.into_poll(PollId::from("q1"), None, Timestamp::UNSET);
        assert!(poll.options.is_empty());
        assert_eq!(poll.kind, PollKind::Question);
    }

    #[test]
    fn test_with_vote() {
        let poll = sample_poll();
        let voted = poll.with_vote(&OptionId::from("opt-1")).unwrap();
        assert_eq!(voted.option(&OptionId::from("opt-1")).unwrap().count, 1);
        assert_eq!(voted.option(&OptionId::from("opt-0")).unwrap().count, 0);
        assert_eq!(voted.votes, 1);
        assert!(voted.is_consistent());

        assert!(poll.with_vote(&OptionId::from("opt-7")).is_none());
    }

    #[test]
    fn test_with_vote_repairs_drifted_total() {
        let mut poll = sample_poll();
        poll.votes = 42;
        assert!(!poll.is_consistent());
        let voted = poll.with_vote(&OptionId::from("opt-0")).unwrap();
        assert_eq!(voted.votes, 1);
    }

    #[test]
    fn test_authorship() {
        let poll = sample_poll();
        assert!(poll.is_authored_by(&UserId::from("u1")));
        assert!(!poll.is_authored_by(&UserId::from("u2")));
    }

    #[test]
    fn test_author_name_fallback() {
        let anon = Author {
            id: UserId::from("u9"),
            display_name: None,
            photo: None,
        };
        assert_eq!(anon.name_or("Anonymous"), "Anonymous");
        assert_eq!(Author::new("u1", "Ana").name_or("Anonymous"), "Ana");
    }

    #[test]
    fn test_poll_kind_serde() {
        let json = serde_json::to_string(&PollKind::Question).unwrap();
        assert_eq!(json, "\"question\"");
    }
}
