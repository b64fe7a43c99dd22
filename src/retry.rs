//! Retry policy for Resource Manager requests.
//!
//! Throttled (429) and server-side (5xx) responses, as well as connection
//! failures, are retried with exponential backoff and jitter. A server
//! supplied `Retry-After` hint replaces the computed delay when present.
//!
//! # Example
//!
//! ```rust,ignore
//! use rustible_azure::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(4)
//!     .initial_delay(Duration::from_millis(500))
//!     .backoff(BackoffStrategy::Exponential { multiplier: 2.0 })
//!     .jitter(JitterStrategy::Equal)
//!     .build();
//!
//! let body = policy.execute(|| client.send_once(&request)).await?;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Linear backoff: delay = initial_delay * (attempt + 1)
    Linear,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth (default: 2.0)
        multiplier: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Linear => base_millis * (f64::from(attempt) + 1.0),
            Self::Exponential { multiplier } => base_millis * multiplier.powf(f64::from(attempt)),
        };

        Duration::from_millis(delay_millis as u64)
    }
}

/// Jitter strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    None,

    /// Full jitter: random value between 0 and calculated delay.
    Full,

    /// Equal jitter: half the delay plus random jitter.
    Equal,
}

impl Default for JitterStrategy {
    fn default() -> Self {
        Self::Equal
    }
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;

        let jittered_millis = match self {
            Self::None => delay_millis,
            Self::Full => {
                if delay_millis > 0.0 {
                    rng.gen_range(0.0..delay_millis)
                } else {
                    0.0
                }
            }
            Self::Equal => {
                let half = delay_millis / 2.0;
                if half > 0.0 {
                    half + rng.gen_range(0.0..half)
                } else {
                    0.0
                }
            }
        };

        Duration::from_millis(jittered_millis.max(0.0) as u64)
    }
}

/// Classification of errors for the retry loop.
pub trait Retryable {
    /// Returns true if this error is transient and should be retried.
    fn is_retryable(&self) -> bool;

    /// Server supplied delay hint, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, just the initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth and `Retry-After`).
    pub max_delay: Duration,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: BackoffStrategy::default(),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a policy with simple constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Calculate the delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        self.jitter.apply(base_delay.min(self.max_delay))
    }

    /// Execute an async operation, retrying while the error is retryable.
    ///
    /// Returns the first success, the first non-retryable error, or the
    /// last error once the retry budget is spent.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Request succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = e
                        .retry_after()
                        .map(|hint| hint.min(self.max_delay))
                        .unwrap_or_else(|| self.delay_for_attempt(attempt));
                    warn!(
                        "Attempt {} of {} failed: {}; retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Builder for constructing RetryPolicy instances.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    /// Set the initial delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff = strategy;
        self
    }

    /// Set the jitter strategy.
    pub fn jitter(mut self, strategy: JitterStrategy) -> Self {
        self.policy.jitter = strategy;
        self
    }

    /// Build the RetryPolicy.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
