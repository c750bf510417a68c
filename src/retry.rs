//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] is a plain decision object: given how many attempts have failed and
//! the last error, it says whether to try again and how long to wait. [`with_retry`]
//! drives any async operation with a policy and a cancellation token.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use eutils_retrieval::retry::{RetryConfig, RetryDecision, RetryPolicy};
//! use eutils_retrieval::RetrievalError;
//!
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let throttled = RetrievalError::ApiError { status: 429, message: "Too Many Requests".into() };
//!
//! assert_eq!(policy.decide(1, &throttled), RetryDecision::Retry(Duration::from_millis(500)));
//! assert_eq!(policy.decide(4, &throttled), RetryDecision::GiveUp);
//! ```

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, RetrievalError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Trait for errors that can be classified as transient or permanent
pub trait RetryableError {
    /// Returns true if the operation that produced this error may succeed when repeated
    fn is_retryable(&self) -> bool;

    /// Short human-readable classification used in logs
    fn retry_reason(&self) -> &str;
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Stretch each delay by a random factor in [1, 2]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(RetrievalError::InvalidConfig(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(RetrievalError::InvalidConfig(format!(
                "initial_delay ({:?}) exceeds max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

/// Outcome of consulting a [`RetryPolicy`] after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    Retry(Duration),
    /// Stop and surface the error
    GiveUp,
}

/// Exponential backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide what to do after `attempt` failed attempts (1 after the first failure)
    pub fn decide<E: RetryableError>(&self, attempt: u32, error: &E) -> RetryDecision {
        if !error.is_retryable() || attempt == 0 || attempt > self.config.max_retries {
            return RetryDecision::GiveUp;
        }

        let delay = self.backoff(attempt);
        if self.config.jitter {
            RetryDecision::Retry(add_jitter(delay))
        } else {
            RetryDecision::Retry(delay)
        }
    }

    /// Un-jittered delay before retry number `attempt` (1-based)
    ///
    /// `initial_delay * backoff_multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        let max_secs = self.config.max_delay.as_secs_f64();

        if !secs.is_finite() || secs >= max_secs {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Run `operation` until it succeeds, the policy gives up, or `cancel` fires
///
/// Transient errors that outlive the budget become [`RetrievalError::RetryExhausted`].
/// Permanent errors are returned unchanged after the first attempt. Cancellation
/// interrupts both an in-flight attempt and a pending backoff sleep.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    context: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
            outcome = operation() => outcome,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    info!(context, attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(RetrievalError::Cancelled) => return Err(RetrievalError::Cancelled),
            Err(err) => err,
        };

        attempt += 1;
        match policy.decide(attempt, &err) {
            RetryDecision::Retry(delay) => {
                warn!(
                    context,
                    error = %err,
                    reason = err.retry_reason(),
                    attempt,
                    max_retries = policy.config().max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::GiveUp if err.is_retryable() => {
                error!(
                    context,
                    error = %err,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetrievalError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            RetryDecision::GiveUp => {
                error!(
                    context,
                    error = %err,
                    reason = err.retry_reason(),
                    "Operation failed with non-retryable error"
                );
                return Err(err);
            }
        }
    }
}

/// Stretch a delay by a uniform factor between 1 and 2
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
