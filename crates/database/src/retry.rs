//! Bounded exponential backoff for optimistic commits.

use std::time::Duration;

/// How often and how patiently a conflicting commit is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            cap,
        }
    }

    /// Returns the total number of attempts, the first included.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Sleeps before the next attempt, if there is one.
    ///
    /// Returns false once `attempt` was the last one.
    pub async fn backoff(&self, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        tokio::time::sleep(self.delay(attempt)).await;
        true
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(5), Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(5), Duration::from_millis(30));
        assert_eq!(policy.delay(1), Duration::from_millis(5));
        assert_eq!(policy.delay(2), Duration::from_millis(10));
        assert_eq!(policy.delay(3), Duration::from_millis(20));
        assert_eq!(policy.delay(4), Duration::from_millis(30));
        assert_eq!(policy.delay(64), Duration::from_millis(30));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_backoff_stops_at_ceiling() {
        let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
        assert!(policy.backoff(1).await);
        assert!(!policy.backoff(2).await);
    }
}
