//! Retry policy for upstream moderation calls.
//!
//! Transient failures (rate limits, connection errors) are retried with a
//! fixed delay up to a bounded attempt budget; everything else propagates on
//! the first failure.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::ModerationError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first call.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
    /// Whether to add jitter to delays.
    pub use_jitter: bool,
    /// Maximum jitter fraction of the delay (0.0 to 1.0).
    pub jitter_factor: f64,
    /// Custom retry condition; defaults to `ModerationError::is_retryable`.
    pub retry_condition: Option<fn(&ModerationError) -> bool>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            use_jitter: false,
            jitter_factor: 0.1,
            retry_condition: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn with_retry_condition(mut self, condition: fn(&ModerationError) -> bool) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    /// Whether an error should be retried under this policy.
    pub fn should_retry(&self, error: &ModerationError) -> bool {
        if let Some(condition) = self.retry_condition {
            condition(error)
        } else {
            error.is_retryable()
        }
    }

    /// Delay to apply after a failed attempt.
    pub fn next_delay(&self) -> Duration {
        if self.use_jitter {
            self.add_jitter(self.delay)
        } else {
            self.delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-jitter_range..=jitter_range);
        let with_jitter = delay.as_millis() as f64 + jitter;
        Duration::from_millis(with_jitter.max(0.0) as u64)
    }
}

/// Executes an operation under a [`RetryPolicy`].
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` up to the policy's attempt budget.
    ///
    /// Non-retryable errors are returned immediately; a retryable error on
    /// the final attempt is returned as-is so callers can degrade it to an
    /// "unavailable" outcome.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ModerationError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ModerationError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        return Err(error);
                    }
                    last_error = Some(error);

                    if attempt == self.policy.max_attempts - 1 {
                        break;
                    }

                    let delay = self.policy.next_delay();
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ModerationError::Internal("retry executor failed without error".to_string())
        }))
    }
}
