//! Fluent builder for `Agora` construction.

use crate::config::AgoraConfig;
use crate::database::Agora;
use crate::identity::{Guest, IdentityProvider};
use agora_core::model::Location;
use agora_core::{Error, Result};
use agora_storage::{DocumentStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fluent builder for constructing an [`Agora`] instance.
///
/// # Example
///
/// ```rust
/// use agora_database::{Agora, SessionIdentity};
/// use agora_core::model::Author;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let agora = Agora::builder()
///     .identity(Arc::new(SessionIdentity::signed_in(Author::new("u1", "Ana"))))
///     .vote_max_attempts(8)
///     .vote_backoff(Duration::from_millis(2), Duration::from_millis(50))
///     .build()
///     .unwrap();
/// assert_eq!(agora.config().vote_max_attempts, 8);
/// ```
pub struct AgoraBuilder {
    config: AgoraConfig,
    store: Option<Arc<dyn DocumentStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl Default for AgoraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgoraBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AgoraConfig::default(),
            store: None,
            identity: None,
        }
    }

    /// Replace the whole configuration, e.g. with `AgoraConfig::from_env()`.
    #[must_use]
    pub fn config(mut self, config: AgoraConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backing store. Defaults to a fresh `MemoryStore`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the identity provider. Defaults to `Guest`.
    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the number of attempts per vote.
    #[must_use]
    pub fn vote_max_attempts(mut self, attempts: u32) -> Self {
        self.config.vote_max_attempts = attempts;
        self
    }

    /// Set the vote backoff base and cap.
    #[must_use]
    pub fn vote_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.config.vote_backoff_base = base;
        self.config.vote_backoff_cap = cap;
        self
    }

    /// Set the change stream reconnect attempts and delay.
    #[must_use]
    pub fn reconnect(mut self, attempts: u32, backoff: Duration) -> Self {
        self.config.reconnect_attempts = attempts;
        self.config.reconnect_backoff = backoff;
        self
    }

    /// Set the default feed radius.
    #[must_use]
    pub fn default_radius_km(mut self, radius_km: f64) -> Self {
        self.config.default_radius_km = radius_km;
        self
    }

    /// Set the fallback viewer location.
    #[must_use]
    pub fn default_origin(mut self, origin: Location) -> Self {
        self.config.default_origin = origin;
        self
    }

    /// Build the `Agora` instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a zero vote attempt budget, a backoff
    /// cap below its base, or a negative or non-finite default radius.
    pub fn build(self) -> Result<Agora> {
        let config = self.config;
        if config.vote_max_attempts == 0 {
            return Err(Error::validation("vote_max_attempts must be at least 1"));
        }
        if config.vote_backoff_cap < config.vote_backoff_base {
            return Err(Error::validation("vote backoff cap must not be below its base"));
        }
        if !config.default_radius_km.is_finite() || config.default_radius_km < 0.0 {
            return Err(Error::validation("default radius must be a non-negative distance"));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>);
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(Guest) as Arc<dyn IdentityProvider>);
        info!(
            vote_max_attempts = config.vote_max_attempts,
            reconnect_attempts = config.reconnect_attempts,
            radius_km = config.default_radius_km,
            "agora ready"
        );
        Ok(Agora::assemble(config, store, identity))
    }
}
