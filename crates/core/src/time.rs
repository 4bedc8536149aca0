//! Server-assigned timestamps.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as assigned by the backing store.
///
/// The store guarantees these are strictly increasing across writes, so they
/// double as a sort and tiebreak key for recency-ordered feeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The zero timestamp, used for documents the store has not stamped yet.
    pub const UNSET: Timestamp = Timestamp(0);

    /// Creates a timestamp from milliseconds since the epoch.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns milliseconds since the epoch.
    #[inline]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
