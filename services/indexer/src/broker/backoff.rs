//! Retry schedule for broker connections.
//!
//! The schedule is a fixed list of base delays. Each wait is randomised to
//! `base/2 + uniform(0, base)` so that many indexers restarting together do not
//! hammer the broker in lockstep.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info};

/// Default base delays, in milliseconds.
pub const DEFAULT_INTERVALS_MS: [u64; 12] = [
    500, 1000, 2000, 4000, 8000, 16000, 32000, 64000, 128000, 256000, 256000, 256000,
];

/// Escalating retry schedule with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    intervals: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_INTERVALS_MS)
    }
}

impl RetrySchedule {
    /// Create a schedule from base delays.
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self { intervals }
    }

    /// Create a schedule from base delays in milliseconds.
    pub fn from_millis(intervals: &[u64]) -> Self {
        Self::new(intervals.iter().copied().map(Duration::from_millis).collect())
    }

    /// Base delays, in order.
    pub fn intervals(&self) -> &[Duration] {
        &self.intervals
    }

    /// Total number of attempts: the first try plus one per interval.
    pub fn max_attempts(&self) -> usize {
        self.intervals.len() + 1
    }

    /// Randomise a base delay to `base/2 + uniform(0, base)`.
    pub fn jittered(base: Duration) -> Duration {
        let ms = base.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(0..ms);
        Duration::from_millis(ms / 2 + jitter)
    }

    /// Run `op` until it succeeds or the schedule is exhausted.
    ///
    /// Failures are logged; the last error is returned once every interval has
    /// been used.
    pub async fn retry<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut result = op().await;

        for (attempt, base) in self.intervals.iter().enumerate() {
            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = Self::jittered(*base);
            error!(operation = %operation, attempt = attempt + 1, error = %err, "Attempt failed");
            info!(
                operation = %operation,
                delay_ms = delay.as_millis() as u64,
                "Trying again after delay"
            );

            tokio::time::sleep(delay).await;
            result = op().await;
        }

        if result.is_err() {
            error!(
                operation = %operation,
                attempts = self.max_attempts(),
                "Giving up after maximum number of attempts"
            );
        }

        result
    }
}
