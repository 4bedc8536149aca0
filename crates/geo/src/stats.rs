//! Dashboard figures over a feed.

use crate::rank::Ranked;
use agora_core::model::Poll;
use agora_core::UserId;
use core::borrow::Borrow;
use serde::{Deserialize, Serialize};

/// Headline numbers for a viewer's feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub active_polls: usize,
    pub total_votes: u64,
}

impl FeedStats {
    /// Computes stats over a set of polls.
    pub fn of<I, P>(polls: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Borrow<Poll>,
    {
        polls.into_iter().fold(Self::default(), |mut stats, poll| {
            stats.active_polls += 1;
            stats.total_votes += poll.borrow().votes;
            stats
        })
    }

    /// Computes stats over a ranked feed.
    pub fn of_ranked<P: Borrow<Poll>>(ranked: &[Ranked<P>]) -> Self {
        Self::of(ranked.iter().map(Ranked::poll))
    }
}

/// Keeps the polls authored by `user`, in input order.
pub fn authored_by<I, P>(polls: I, user: &UserId) -> Vec<P>
where
    I: IntoIterator<Item = P>,
    P: Borrow<Poll>,
{
    polls
        .into_iter()
        .filter(|poll| poll.borrow().is_authored_by(user))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::RankQuery;
    use agora_core::model::{Author, PollDraft};
    use agora_core::{OptionId, PollId, Timestamp};

    fn poll(id: &str, author: Option<&str>, votes: usize) -> Poll {
        let mut poll = PollDraft::poll("Q", ["a", "b"]).into_poll(
            PollId::from(id),
            author.map(|a| Author::new(a, a)),
            Timestamp::from_millis(1),
        );
        for _ in 0..votes {
            poll = poll.with_vote(&OptionId::from("opt-1")).unwrap();
        }
        poll
    }

    #[test]
    fn test_stats() {
        let polls = vec![poll("p1", None, 3), poll("p2", None, 4)];
        assert_eq!(
            FeedStats::of(&polls),
            FeedStats {
                active_polls: 2,
                total_votes: 7
            }
        );
        assert_eq!(FeedStats::of(Vec::<Poll>::new()), FeedStats::default());
    }

    #[test]
    fn test_stats_over_ranked() {
        let polls = vec![poll("p1", None, 2)];
        let ranked = RankQuery::default().apply(&polls);
        assert_eq!(FeedStats::of_ranked(&ranked).total_votes, 2);
    }

    #[test]
    fn test_authored_by() {
        let polls = vec![poll("p1", Some("u1"), 0), poll("p2", Some("u2"), 0), poll("p3", None, 0)];
        let mine = authored_by(&polls, &UserId::from("u1"));
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id.as_str(), "p1");
    }
}
