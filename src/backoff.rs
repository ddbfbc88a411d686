//! Delay schedules between delivery attempts.
//!
//! Attempt `0` is the initial send and never waits; retries start at attempt `1`.
//! Delays saturate at [`MAX_BACKOFF`] instead of overflowing.
//!
//! ```rust
//! use std::time::Duration;
//! use logfan::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_secs(2))
//!     .with_max(Duration::from_secs(30))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::ZERO);
//! assert_eq!(backoff.delay(1), Duration::from_secs(2));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//! assert_eq!(backoff.delay(10), Duration::from_secs(30));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Upper bound for any computed delay (1 hour). A digest older than that is stale anyway.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    #[error("with_max is only valid for linear or exponential backoff")]
    ConstantDoesNotSupportMax,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Constant(Duration),
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, max: Option<Duration> },
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant(delay)
    }

    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base, max: None }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: None }
    }

    /// Cap linear or exponential growth.
    pub fn with_max(self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match self {
            Backoff::Constant(_) => Err(BackoffError::ConstantDoesNotSupportMax),
            Backoff::Linear { base, .. } if max < base => {
                Err(BackoffError::MaxLessThanBase { base, max })
            }
            Backoff::Exponential { base, .. } if max < base => {
                Err(BackoffError::MaxLessThanBase { base, max })
            }
            Backoff::Linear { base, .. } => Ok(Backoff::Linear { base, max: Some(max) }),
            Backoff::Exponential { base, .. } => Ok(Backoff::Exponential { base, max: Some(max) }),
        }
    }

    /// Delay before `attempt` (0 = initial send).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let raw = match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Linear { base, max } => {
                let n = attempt.min(u32::MAX as usize) as u32;
                cap(base.checked_mul(n).unwrap_or(MAX_BACKOFF), max)
            }
            Backoff::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
                let nanos = base.as_nanos().saturating_mul(2u128.saturating_pow(exponent));
                let delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                cap(delay, max)
            }
        };
        raw.min(MAX_BACKOFF)
    }
}

fn cap(delay: Duration, max: Option<Duration>) -> Duration {
    max.map(|m| delay.min(m)).unwrap_or(delay)
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::exponential(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_attempt_after_first() {
        let b = Backoff::constant(Duration::from_millis(250));
        assert_eq!(b.delay(0), Duration::ZERO);
        assert_eq!(b.delay(1), Duration::from_millis(250));
        assert_eq!(b.delay(9), Duration::from_millis(250));
    }

    #[test]
    fn linear_grows_and_caps() {
        let b = Backoff::linear(Duration::from_secs(1)).with_max(Duration::from_secs(3)).unwrap();
        assert_eq!(b.delay(1), Duration::from_secs(1));
        assert_eq!(b.delay(2), Duration::from_secs(2));
        assert_eq!(b.delay(5), Duration::from_secs(3));
    }

    #[test]
    fn exponential_saturates() {
        let b = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(b.delay(2), Duration::from_secs(2));
        assert_eq!(b.delay(200), MAX_BACKOFF);
    }

    #[test]
    fn with_max_validation() {
        assert_eq!(
            Backoff::constant(Duration::from_secs(1)).with_max(Duration::from_secs(2)),
            Err(BackoffError::ConstantDoesNotSupportMax)
        );
        assert_eq!(
            Backoff::linear(Duration::from_secs(1)).with_max(Duration::ZERO),
            Err(BackoffError::MaxMustBePositive)
        );
        assert!(matches!(
            Backoff::exponential(Duration::from_secs(4)).with_max(Duration::from_secs(1)),
            Err(BackoffError::MaxLessThanBase { .. })
        ));
    }
}
