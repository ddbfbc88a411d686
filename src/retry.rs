//! Bounded retry for digest delivery.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial send + retries). The default is `1`, i.e.
//!   discard-on-failure.
//! - Only [`DeliveryError::Transport`] is retried; an authentication rejection returns at once.
//! - The backoff delay for retry `n` is `backoff.delay(n)`; the sleeper applies it on the calling
//!   thread.
//!
//! ```rust
//! use std::time::Duration;
//! use logfan::{Backoff, DeliveryRetry, DeliveryError, InstantSleeper};
//!
//! let retry = DeliveryRetry::builder()
//!     .max_attempts(3)
//!     .backoff(Backoff::constant(Duration::from_secs(1)))
//!     .sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//! let mut calls = 0;
//! let result = retry.run(|_| {
//!     calls += 1;
//!     if calls < 3 { Err(DeliveryError::transport("refused")) } else { Ok(()) }
//! });
//! assert_eq!(result.unwrap(), 3);
//! ```

use crate::backoff::Backoff;
use crate::error::DeliveryError;
use crate::sleeper::{Sleeper, ThreadSleeper};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Delivery gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery failed after {attempts} attempt(s): {last}")]
pub struct DeliveryExhausted {
    pub attempts: usize,
    #[source]
    pub last: DeliveryError,
}

#[derive(Debug, Clone)]
pub struct DeliveryRetry {
    max_attempts: usize,
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for DeliveryRetry {
    /// A single attempt, no retry.
    fn default() -> Self {
        Self { max_attempts: 1, backoff: Backoff::default(), sleeper: Arc::new(ThreadSleeper) }
    }
}

impl DeliveryRetry {
    pub fn builder() -> DeliveryRetryBuilder {
        DeliveryRetryBuilder::new()
    }

    /// Single attempt; a failed batch is discarded.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Call `send` (given the 0-based attempt index) until it succeeds, fails with a
    /// non-retryable error, or attempts run out. Returns the number of attempts used.
    pub fn run<F>(&self, mut send: F) -> Result<usize, DeliveryExhausted>
    where
        F: FnMut(usize) -> Result<(), DeliveryError>,
    {
        let mut attempt = 0;
        loop {
            match send(attempt) {
                Ok(()) => return Ok(attempt + 1),
                Err(err) => {
                    let used = attempt + 1;
                    if !err.is_retryable() || used >= self.max_attempts {
                        return Err(DeliveryExhausted { attempts: used, last: err });
                    }
                    let delay = self.backoff.delay(used);
                    debug!(
                        target: "logfan::alert",
                        attempt = used,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "digest delivery failed; retrying"
                    );
                    self.sleeper.sleep(delay);
                    attempt = used;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryBuildError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
}

pub struct DeliveryRetryBuilder {
    max_attempts: usize,
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl DeliveryRetryBuilder {
    pub fn new() -> Self {
        let defaults = DeliveryRetry::default();
        Self {
            max_attempts: defaults.max_attempts,
            backoff: defaults.backoff,
            sleeper: defaults.sleeper,
        }
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<DeliveryRetry, RetryBuildError> {
        if self.max_attempts == 0 {
            return Err(RetryBuildError::InvalidMaxAttempts(0));
        }
        Ok(DeliveryRetry {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            sleeper: self.sleeper,
        })
    }
}

impl Default for DeliveryRetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
