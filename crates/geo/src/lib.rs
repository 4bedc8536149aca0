//! Agora Geo - Proximity ranking for Agora polls.
//!
//! Pure functions that scope which polls a viewer sees: haversine distance,
//! radius and category filtering, free-text search, and a stable sort by
//! distance. Nothing here performs I/O; the functions run read-side over a
//! reconciled snapshot.
//!
//! # Example
//!
//! ```rust
//! use agora_core::model::{Location, PollDraft};
//! use agora_core::{PollId, Timestamp};
//! use agora_geo::{CategoryFilter, RankQuery};
//!
//! let poll = PollDraft::poll("Lunch?", ["Tacos", "Pho"])
//!     .category("Food")
//!     .location(Location::new(37.7750, -122.4195, "Mission"))
//!     .into_poll(PollId::from("p1"), None, Timestamp::from_millis(1));
//!
//! let query = RankQuery::around(Location::new(37.7749, -122.4194, "Me"))
//!     .radius_km(10.0)
//!     .category(CategoryFilter::parse("Food"));
//! let ranked = query.apply(vec![poll]);
//! assert_eq!(ranked.len(), 1);
//! assert!(ranked[0].distance_km < 0.1);
//! ```

mod distance;
mod rank;
mod stats;

pub use distance::{distance_km, Coordinates, EARTH_RADIUS_KM};
pub use rank::{
    default_origin, filter_and_rank, CategoryFilter, RankQuery, Ranked, CATEGORIES, DEFAULT_RADIUS_KM,
};
pub use stats::{authored_by, FeedStats};
