//! Error types for Agora.

use core::fmt;

/// Result type alias for Agora operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The kind of entity an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Poll,
    PollOption,
    Comment,
    Notification,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Poll => "Poll",
            EntityKind::PollOption => "Poll option",
            EntityKind::Comment => "Comment",
            EntityKind::Notification => "Notification",
        };
        f.write_str(name)
    }
}

/// Error kinds surfaced by Agora operations.
///
/// Every public operation returns one of these instead of panicking, so the
/// presentation layer can decide between correcting input, retrying, or
/// showing a degraded-mode banner.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed input. The caller can fix the input and try again.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The target poll, option, comment or notification does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Optimistic commits kept conflicting until the retry ceiling was hit.
    /// Transient; safe to retry manually.
    #[error("Gave up on {target} after {attempts} conflicting attempts")]
    ConflictExhausted { target: String, attempts: u32 },

    /// The change stream backing a subscription failed. The last known
    /// snapshot is still served while the stream reconnects.
    #[error("Change stream error: {message}")]
    Stream { message: String },

    /// The operation requires a signed-in caller.
    #[error("Authentication required to {action}")]
    Unauthenticated { action: String },

    /// The backing store rejected or failed the request.
    #[error("Store error: {message}")]
    Store { message: String },
}

impl Error {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Creates a conflict exhausted error.
    pub fn conflict_exhausted(target: impl Into<String>, attempts: u32) -> Self {
        Error::ConflictExhausted {
            target: target.into(),
            attempts,
        }
    }

    /// Creates a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Error::Stream {
            message: message.into(),
        }
    }

    /// Creates an unauthenticated error.
    pub fn unauthenticated(action: impl Into<String>) -> Self {
        Error::Unauthenticated {
            action: action.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConflictExhausted { .. } | Error::Stream { .. } | Error::Store { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found(EntityKind::Poll, "abc");
        assert_eq!(err.to_string(), "Poll not found: abc");

        let err = Error::conflict_exhausted("poll abc", 5);
        assert!(err.to_string().contains("5 conflicting attempts"));

        let err = Error::unauthenticated("post a comment");
        assert_eq!(err.to_string(), "Authentication required to post a comment");
    }

    #[test]
    fn test_error_transient() {
        assert!(Error::conflict_exhausted("poll", 5).is_transient());
        assert!(Error::stream("closed").is_transient());
        assert!(!Error::validation("empty").is_transient());
        assert!(!Error::not_found(EntityKind::PollOption, "opt-9").is_transient());
    }
}
