//! Agora Core - Core types and error definitions for the Agora polling engine.
//!
//! This crate provides the foundational types shared by every other Agora crate:
//!
//! - Identifiers: `PollId`, `OptionId`, `CommentId`, `NotificationId`, `UserId`
//! - `Timestamp`: server-assigned, monotonic creation time
//! - `model`: `Poll`, `PollOption`, `Comment`, `Notification` and their drafts
//! - `Error`: the error kinds surfaced across the public boundary
//!
//! # Example
//!
//! ```rust
//! use agora_core::model::{Location, PollDraft};
//! use agora_core::{OptionId, Timestamp};
//!
//! let draft = PollDraft::poll("Best taco spot?", ["La Taqueria", "El Farolito"])
//!     .category("Food")
//!     .location(Location::new(37.7749, -122.4194, "Mission"));
//! draft.validate().unwrap();
//!
//! let poll = draft.into_poll("p1".into(), None, Timestamp::from_millis(1_000));
//! let voted = poll.with_vote(&OptionId::from("opt-0")).unwrap();
//! assert_eq!(voted.votes, 1);
//! assert!(voted.is_consistent());
//! ```

mod error;
mod ids;
pub mod model;
mod time;

pub use error::{EntityKind, Error, Result};
pub use ids::{CommentId, NotificationId, OptionId, PollId, UserId};
pub use time::Timestamp;
