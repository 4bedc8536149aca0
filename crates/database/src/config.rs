//! Configuration for an `Agora` instance.

use agora_core::model::Location;
use agora_geo::{default_origin, DEFAULT_RADIUS_KM};
use agora_reactive::ReconnectPolicy;
use core::fmt::Display;
use core::str::FromStr;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::retry::RetryPolicy;

/// Configuration for an `Agora` instance.
#[derive(Debug, Clone)]
pub struct AgoraConfig {
    /// Attempts per vote before giving up with `ConflictExhausted`.
    /// Also bounds notification batch retries. Default: 5.
    pub vote_max_attempts: u32,
    /// Backoff before the second vote attempt; doubles per attempt.
    pub vote_backoff_base: Duration,
    /// Upper bound for a single vote backoff.
    pub vote_backoff_cap: Duration,
    /// Attempts to re-open a failed change stream.
    pub reconnect_attempts: u32,
    /// Reconnect delay; attempt `n` waits `n` times this.
    pub reconnect_backoff: Duration,
    /// Search radius for feeds when the viewer does not pick one.
    pub default_radius_km: f64,
    /// Viewer location when none is known.
    pub default_origin: Location,
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            vote_max_attempts: 5,
            vote_backoff_base: Duration::from_millis(5),
            vote_backoff_cap: Duration::from_millis(100),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(50),
            default_radius_km: DEFAULT_RADIUS_KM,
            default_origin: default_origin(),
        }
    }
}

impl AgoraConfig {
    /// Reads overrides from `AGORA_*` environment variables.
    ///
    /// Recognized: `AGORA_VOTE_MAX_ATTEMPTS`, `AGORA_VOTE_BACKOFF_MS`,
    /// `AGORA_VOTE_BACKOFF_CAP_MS`, `AGORA_RECONNECT_ATTEMPTS`,
    /// `AGORA_RECONNECT_BACKOFF_MS`, `AGORA_DEFAULT_RADIUS_KM`. Unset
    /// variables keep their defaults; malformed ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(try_load(&lookup, key, default.as_millis() as u64))
        };
        Self {
            vote_max_attempts: try_load(&lookup, "AGORA_VOTE_MAX_ATTEMPTS", defaults.vote_max_attempts),
            vote_backoff_base: millis("AGORA_VOTE_BACKOFF_MS", defaults.vote_backoff_base),
            vote_backoff_cap: millis("AGORA_VOTE_BACKOFF_CAP_MS", defaults.vote_backoff_cap),
            reconnect_attempts: try_load(&lookup, "AGORA_RECONNECT_ATTEMPTS", defaults.reconnect_attempts),
            reconnect_backoff: millis("AGORA_RECONNECT_BACKOFF_MS", defaults.reconnect_backoff),
            default_radius_km: try_load(&lookup, "AGORA_DEFAULT_RADIUS_KM", defaults.default_radius_km),
            default_origin: defaults.default_origin,
        }
    }

    /// Returns the vote retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.vote_max_attempts, self.vote_backoff_base, self.vote_backoff_cap)
    }

    /// Returns the change stream reconnect policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_attempts,
            backoff: self.reconnect_backoff,
        }
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => {
            info!("{key} set to {value}");
            value
        }
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgoraConfig::default();
        assert_eq!(config.vote_max_attempts, 5);
        assert_eq!(config.default_radius_km, 50.0);
        assert_eq!(config.default_origin.name, "Silicon Valley");
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let config = AgoraConfig::from_lookup(lookup(&[
            ("AGORA_VOTE_MAX_ATTEMPTS", "8"),
            ("AGORA_VOTE_BACKOFF_MS", " 2 "),
            ("AGORA_DEFAULT_RADIUS_KM", "12.5"),
        ]));
        assert_eq!(config.vote_max_attempts, 8);
        assert_eq!(config.vote_backoff_base, Duration::from_millis(2));
        assert_eq!(config.default_radius_km, 12.5);
        assert_eq!(config.vote_backoff_cap, Duration::from_millis(100));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = AgoraConfig::from_lookup(lookup(&[
            ("AGORA_VOTE_MAX_ATTEMPTS", "lots"),
            ("AGORA_RECONNECT_BACKOFF_MS", "-3"),
        ]));
        assert_eq!(config.vote_max_attempts, 5);
        assert_eq!(config.reconnect_backoff, Duration::from_millis(50));
    }
}
