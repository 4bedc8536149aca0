//! Radius filtering and proximity ranking.

use crate::distance::Coordinates;
use agora_core::model::{Location, Poll};
use core::borrow::Borrow;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Default search radius around the viewer, in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Categories offered for filtering, `All` first.
pub const CATEGORIES: [&str; 5] = ["All", "Food", "Safety", "Events", "General"];

/// Location used when the viewer's own position is unknown.
pub fn default_origin() -> Location {
    Location::new(37.7749, -122.4194, "Silicon Valley")
}

/// Which categories pass the filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    /// Polls whose category contains this text (case-sensitive).
    Only(String),
}

impl CategoryFilter {
    /// Parses a category label; `"All"` and blank labels match everything.
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label == "All" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(label.to_string())
        }
    }

    /// Returns true if `category` passes.
    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category.contains(wanted.as_str()),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(category) => f.write_str(category),
        }
    }
}

/// A poll with its distance from the viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranked<P> {
    pub poll: P,
    pub distance_km: f64,
}

impl<P: Borrow<Poll>> Ranked<P> {
    #[inline]
    pub fn poll(&self) -> &Poll {
        self.poll.borrow()
    }
}

/// Keeps polls within `radius_km` of `origin` that pass the category filter
/// and whose question contains `text` (case-insensitive; empty matches
/// everything), sorted by ascending distance.
///
/// The sort is stable, so polls at equal distance keep their input order.
/// Polls whose distance cannot be computed (non-finite coordinates) are
/// dropped.
pub fn filter_and_rank<I, P>(
    polls: I,
    origin: &Coordinates,
    radius_km: f64,
    category: &CategoryFilter,
    text: &str,
) -> Vec<Ranked<P>>
where
    I: IntoIterator<Item = P>,
    P: Borrow<Poll>,
{
    let needle = text.trim().to_lowercase();
    let mut ranked: Vec<Ranked<P>> = polls
        .into_iter()
        .filter_map(|poll| {
            let p = poll.borrow();
            if !category.matches(&p.category) {
                return None;
            }
            if !needle.is_empty() && !p.question.to_lowercase().contains(&needle) {
                return None;
            }
            let distance_km = origin.distance_to(&Coordinates::from(&p.location));
            // NaN fails this comparison too
            if distance_km <= radius_km {
                Some(Ranked { poll, distance_km })
            } else {
                None
            }
        })
        .collect();
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

/// A viewer's feed request: where they are, how far to look, and what to
/// show.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankQuery {
    pub origin: Location,
    pub radius_km: f64,
    pub category: CategoryFilter,
    pub text: String,
}

impl Default for RankQuery {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            radius_km: DEFAULT_RADIUS_KM,
            category: CategoryFilter::All,
            text: String::new(),
        }
    }
}

impl RankQuery {
    /// Creates a query around `origin` with default radius and no filters.
    pub fn around(origin: Location) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Runs the query over `polls`.
    pub fn apply<I, P>(&self, polls: I) -> Vec<Ranked<P>>
    where
        I: IntoIterator<Item = P>,
        P: Borrow<Poll>,
    {
        filter_and_rank(
            polls,
            &Coordinates::from(&self.origin),
            self.radius_km,
            &self.category,
            &self.text,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::model::PollDraft;
    use agora_core::{PollId, Timestamp};

    fn poll_at(id: &str, question: &str, category: &str, lat: f64, lng: f64) -> Poll {
        PollDraft::poll(question, ["a", "b"])
            .category(category)
            .location(Location::new(lat, lng, id))
            .into_poll(PollId::from(id), None, Timestamp::from_millis(1))
    }

    fn ids<P: Borrow<Poll>>(ranked: &[Ranked<P>]) -> Vec<&str> {
        ranked.iter().map(|r| r.poll().id.as_str()).collect()
    }

    #[test]
    fn test_radius_scenario() {
        let polls = vec![
            poll_at("near", "Coffee?", "Food", 37.7750, -122.4195),
            poll_at("nyc", "Bagels?", "Food", 40.7128, -74.0060),
        ];
        let origin = Coordinates::new(37.7749, -122.4194);
        let ranked = filter_and_rank(&polls, &origin, 10.0, &CategoryFilter::All, "");
        assert_eq!(ids(&ranked), vec!["near"]);
        assert!(ranked[0].distance_km < 0.1);
    }

    #[test]
    fn test_sorted_by_distance() {
        let polls = vec![
            poll_at("far", "Q", "General", 37.90, -122.40),
            poll_at("here", "Q", "General", 37.7749, -122.4194),
            poll_at("mid", "Q", "General", 37.80, -122.42),
        ];
        let query = RankQuery::around(Location::new(37.7749, -122.4194, "SF"));
        let ranked = query.apply(polls);
        assert_eq!(ids(&ranked), vec!["here", "mid", "far"]);
        assert_eq!(ranked[0].distance_km, 0.0);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let polls = vec![
            poll_at("a", "Best tacos?", "Food", 37.7749, -122.4194),
            poll_at("b", "Best tacos?", "Events", 37.7749, -122.4194),
            poll_at("c", "Street fair?", "Food", 37.7749, -122.4194),
        ];
        let query = RankQuery::default()
            .category(CategoryFilter::parse("Food"))
            .text("TACO");
        assert_eq!(ids(&query.apply(&polls)), vec!["a"]);
    }

    #[test]
    fn test_category_contains() {
        let filter = CategoryFilter::parse("Food");
        assert!(filter.matches("Food"));
        assert!(filter.matches("Food & Drink"));
        assert!(!filter.matches("food"));
        assert!(CategoryFilter::parse("All").matches("anything"));
        assert_eq!(CategoryFilter::parse("  "), CategoryFilter::All);
    }

    #[test]
    fn test_stable_on_ties() {
        let polls = vec![
            poll_at("first", "Q", "General", 37.7749, -122.4194),
            poll_at("second", "Q", "General", 37.7749, -122.4194),
        ];
        let ranked = RankQuery::default().apply(&polls);
        assert_eq!(ids(&ranked), vec!["first", "second"]);
    }

    #[test]
    fn test_non_finite_coordinates_dropped() {
        let polls = vec![poll_at("bad", "Q", "General", f64::NAN, 0.0)];
        assert!(RankQuery::default().radius_km(f64::INFINITY).apply(&polls).is_empty());
    }

    #[test]
    fn test_defaults() {
        let query = RankQuery::default();
        assert_eq!(query.radius_km, DEFAULT_RADIUS_KM);
        assert_eq!(query.origin.name, "Silicon Valley");
        assert_eq!(CATEGORIES[0], "All");
    }
}
