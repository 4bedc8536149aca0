//! Who is calling.
//!
//! Identity is issued elsewhere; Agora only asks for the current caller.

use agora_core::model::Author;
use parking_lot::RwLock;

/// Source of the current caller's identity.
pub trait IdentityProvider: Send + Sync {
    /// Returns the signed-in caller, or `None` for a guest.
    fn current(&self) -> Option<Author>;
}

/// A caller that never signs in.
#[derive(Clone, Copy, Debug, Default)]
pub struct Guest;

impl IdentityProvider for Guest {
    fn current(&self) -> Option<Author> {
        None
    }
}

/// A switchable session, for embedders that manage sign-in themselves.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    author: RwLock<Option<Author>>,
}

impl SessionIdentity {
    /// Creates a session signed in as `author`.
    pub fn signed_in(author: Author) -> Self {
        Self {
            author: RwLock::new(Some(author)),
        }
    }

    pub fn sign_in(&self, author: Author) {
        *self.author.write() = Some(author);
    }

    pub fn sign_out(&self) {
        *self.author.write() = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<Author> {
        self.author.read().clone()
    }
}
