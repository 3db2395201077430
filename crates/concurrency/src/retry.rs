//! Retry policy for optimistic concurrency control
//!
//! The classic OCC loop retries forever with no pause. Under heavy
//! contention that can starve a worker, so the policy can also be bounded,
//! in which case attempts are spaced by exponential backoff:
//!
//! ```text
//! delay(n) = min(base * 2^(n-1), max)    n = attempts already made
//! ```

use std::time::Duration;

use counterlab_core::RetryConfig;

/// How many times an OCC iteration may be attempted, and how long to wait
/// between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Retry forever with no pause
    pub const fn unbounded() -> Self {
        RetryPolicy {
            max_attempts: None,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Give up after `max_attempts`, with exponential backoff in between
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn bounded(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: Some(max_attempts.max(1)),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    /// Build from the `[retry]` configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.map(|n| n.max(1)),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.base_backoff_ms)),
        }
    }

    /// Attempt cap, `None` if unbounded
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Whether another attempt may follow `attempts_made` failed ones
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            None => true,
            Some(max) => attempts_made < max,
        }
    }

    /// Pause before the attempt following `attempts_made` failed ones
    pub fn backoff(&self, attempts_made: u32) -> Duration {
        if self.base_backoff.is_zero() || attempts_made == 0 {
            return Duration::ZERO;
        }
        let shift = (attempts_made - 1).min(31);
        let factor = 1u32 << shift;
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}
