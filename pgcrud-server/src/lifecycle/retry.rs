//! Startup retry policy

use std::time::Duration;

/// Bounded exponential backoff for the startup connectivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connectivity attempts before giving up (at least 1).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// How often a failed instance re-checks the database. Zero disables it.
    pub recheck_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            recheck_interval: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `initial_backoff * 2^(attempt - 1)`, capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Sum of every delay a fully failing startup would sleep.
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.delay_for(n)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(initial_ms),
            max_backoff: Duration::from_millis(max_ms),
            recheck_interval: Duration::ZERO,
        }
    }

    #[test]
    fn doubles_until_cap() {
        let p = policy(100, 500);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(500));
        assert_eq!(p.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn never_decreases() {
        let p = policy(7, 10_000);
        let delays: Vec<_> = (1..64).map(|n| p.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= p.max_backoff));
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        let p = policy(100, 500);
        assert_eq!(p.delay_for(0), p.delay_for(1));
    }

    #[test]
    fn total_delay_skips_last_attempt() {
        let p = RetryPolicy {
            max_attempts: 4,
            ..policy(100, 1_000)
        };
        assert_eq!(p.total_delay(), Duration::from_millis(700));
    }
}
