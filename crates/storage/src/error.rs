//! Errors reported by document store backends.

use crate::collection::Collection;

/// A failure inside the backing store or its transport.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write (permissions, quota, malformed document).
    #[error("write to {collection} rejected: {reason}")]
    Rejected { collection: Collection, reason: String },

    /// A change stream ended with an error signal.
    #[error("change stream on {collection} failed: {reason}")]
    StreamFailed { collection: Collection, reason: String },
}

impl From<StoreError> for agora_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StreamFailed { .. } => agora_core::Error::stream(err.to_string()),
            other => agora_core::Error::store(other.to_string()),
        }
    }
}
