//! Bounded retry with exponential backoff for steps that must complete.

use crate::errors::{BuxError, BuxResult};
use rand::{Rng, RngCore};
use std::{future::Future, time::Duration};

/// Default attempt count for must-complete steps
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default delay before the second attempt
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(25);

/// Default ceiling for a single backoff
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Retry settings for credits, refunds and rollbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Un-jittered backoff before attempt `attempt + 1` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// # Arguments
    ///
    /// * `label` - Operation name used in log lines
    /// * `operation` - Factory producing one attempt
    ///
    /// # Returns
    ///
    /// * `BuxResult<T>` - First success, or the last error seen
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> BuxResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BuxResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = jittered_backoff(&mut rand::rng(), self.backoff(attempt));
                    log::warn!(
                        "{label} failed (attempt {attempt}/{attempts}): {e}; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Equal jitter: the returned delay lies in `[backoff/2, backoff]`.
pub fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
    if backoff_ms <= 1 {
        return backoff;
    }

    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.random_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

/// Wrap an exhausted must-complete step as an `Internal` failure.
pub(crate) fn reconciliation_error(step: &str, cause: &BuxError) -> BuxError {
    BuxError::Internal(format!("{step} did not complete: {cause}"))
}
