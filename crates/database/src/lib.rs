//! Agora Database - Public API for the Agora live polling engine.
//!
//! This crate ties the engine together: polls and the transactional vote
//! protocol, the comment write path with its notification side effects,
//! live subscriptions, and proximity-ranked feeds.
//!
//! # Core Components
//!
//! - `Agora`: Main entry point
//! - `AgoraBuilder` / `AgoraConfig`: Construction and tuning
//! - `PollAggregateStore`: Poll creation, votes and deletion
//! - `CommentWriter`: Comment posts
//! - `NotificationFanout`: Notifications derived from comments, read state
//! - `IdentityProvider`: The current caller
//!
//! # Example
//!
//! ```rust
//! use agora_core::model::{Author, PollDraft};
//! use agora_core::OptionId;
//! use agora_database::{Agora, SessionIdentity};
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let agora = Agora::builder()
//!     .identity(Arc::new(SessionIdentity::signed_in(Author::new("u1", "Ana"))))
//!     .build()
//!     .unwrap();
//!
//! let poll = agora
//!     .create_poll(PollDraft::poll("Best taco spot?", ["La Taqueria", "El Farolito"]).category("Food"))
//!     .await
//!     .unwrap();
//! let voted = agora.cast_vote(&poll, &OptionId::from("opt-0")).await.unwrap();
//! assert_eq!(voted.votes, 1);
//!
//! let feed = agora.nearby(&agora.default_query()).await.unwrap();
//! assert_eq!(feed.len(), 1);
//! # });
//! ```

mod builder;
pub mod comments;
mod config;
pub mod database;
mod identity;
pub mod notifications;
pub mod polls;
mod retry;

pub use builder::AgoraBuilder;
pub use comments::CommentWriter;
pub use config::AgoraConfig;
pub use database::Agora;
pub use identity::{Guest, IdentityProvider, SessionIdentity};
pub use notifications::NotificationFanout;
pub use polls::PollAggregateStore;
pub use retry::RetryPolicy;

// Re-export commonly used types from dependencies
pub use agora_core::{Error, Result};
pub use agora_geo::{distance_km, filter_and_rank, CategoryFilter, FeedStats, RankQuery, Ranked};
pub use agora_reactive::{FeedEvent, QueryDescriptor, Snapshot, SubscriptionGuard, SubscriptionHandle};
