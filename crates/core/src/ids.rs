//! Opaque identifiers.
//!
//! Identifiers are assigned by the backing store (polls, comments,
//! notifications), by poll creation (options) or by the identity provider
//! (users). They are plain strings on the wire.

use core::fmt;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier has not been assigned yet.
            #[inline]
            pub fn is_unassigned(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a poll document.
    PollId
);
string_id!(
    /// Identifier of an option, stable within its poll.
    OptionId
);
string_id!(
    /// Identifier of a comment document.
    CommentId
);
string_id!(
    /// Identifier of a notification document.
    NotificationId
);
string_id!(
    /// Identifier of a user, issued by the identity provider.
    UserId
);

impl OptionId {
    /// Returns the option id assigned to the option at `index` on creation.
    pub fn for_index(index: usize) -> Self {
        Self(format!("opt-{}", index))
    }
}
