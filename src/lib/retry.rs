//! Retry policies for transient failures.
//!
//! Store and coordination calls can fail transiently (throttling, connection
//! resets). Every retry site in the crate goes through [`retry_with_backoff`]
//! with an explicit [`RetryPolicy`], so the two schedules in use are easy to
//! audit: ranged fetches use a bounded exponential policy, coordination
//! updates use an unbounded fixed-delay policy.

use crate::errors::VarsumError;
use log::warn;
use std::fmt::Display;
use std::time::Duration;

/// Classifies errors by whether a retry may succeed.
pub trait Retryable {
    /// Whether the operation that failed with this error may succeed if retried.
    fn is_retryable(&self) -> bool;
}

impl Retryable for VarsumError {
    fn is_retryable(&self) -> bool {
        VarsumError::is_retryable(self)
    }
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
        )
    }
}

/// Backoff schedule for retrying an operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts; `None` retries until success or a permanent error.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff capped at 10s, giving up after `max_attempts`.
    #[must_use]
    pub fn bounded(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay,
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Fixed-delay policy that never gives up on retryable errors.
    ///
    /// Conditional coordination updates use this: the update is retried at a
    /// constant interval until it is applied or rejected outright.
    #[must_use]
    pub fn unbounded(delay: Duration) -> Self {
        Self { max_attempts: None, initial_delay: delay, multiplier: 1.0, max_delay: delay }
    }

    /// Delay before the retry following attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation`, retrying on retryable errors per `policy`.
///
/// Permanent errors are returned immediately. When the attempt limit is
/// reached, the last error is returned.
///
/// # Errors
///
/// Returns the first permanent error, or the last transient error once the
/// policy's attempt limit is exhausted.
pub fn retry_with_backoff<T, E, F>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(e);
                    }
                }
                let delay = policy.delay_for(attempt);
                warn!("{what} failed (attempt {attempt}): {e}; retrying in {delay:?}");
                std::thread::sleep(delay);
            }
        }
    }
}
