//! Retry policy and error classification for adapter fetch attempts.

use std::time::Duration;

use crate::adapter::{AdapterError, AdapterErrorKind};
use crate::ValidationError;

/// Error phrases that mark an attempt as permanently failed.
const NON_RETRYABLE_PHRASES: [&str; 4] = [
    "movie not found",
    "validation failed",
    "context canceled",
    "context deadline exceeded",
];

/// Wait inserted between two `fetch` attempts of the same adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same pause after every failed attempt.
    Fixed { delay: Duration },
    /// Pause of `base * factor^n` after failed attempt `n + 1`, never above `max`.
    ///
    /// With `jitter` each pause is drawn uniformly from half to one and a half
    /// times its nominal value.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based: the wait after the first
    /// failed attempt is `delay(0)`).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped = Duration::try_from_secs_f64(seconds.min(max.as_secs_f64()))
                    .unwrap_or(max);

                if !jitter {
                    return capped;
                }

                let millis = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
                let spread = millis / 2;
                let offset = fastrand::u64(0..=spread.saturating_mul(2));
                Duration::from_millis((millis + offset).saturating_sub(spread))
            }
        }
    }

    /// Rejects exponential settings that cannot produce a growing pause.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Fixed { .. } => Ok(()),
            Self::Exponential { base, factor, .. } => {
                if base.is_zero() {
                    return Err(ValidationError::ZeroConfigValue {
                        field: "retry.backoff.base",
                    });
                }
                if !factor.is_finite() || factor < 1.0 {
                    return Err(ValidationError::InvalidBackoffFactor {
                        value: factor.to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Retry configuration for one adapter task.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// When disabled every adapter gets exactly one attempt.
    pub enabled: bool,
    /// Total number of fetch attempts per adapter when enabled.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            enabled: true,
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn exponential(max_retries: u32) -> Self {
        Self {
            enabled: true,
            max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(200),
                factor: 2.0,
                max: Duration::from_secs(3),
                jitter: true,
            },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 1,
            backoff: Backoff::default(),
        }
    }

    /// Number of attempts a task makes; never less than one.
    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.max(1)
        } else {
            1
        }
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }
}

/// Decides whether a failed attempt is worth repeating.
///
/// Not-found, validation and context errors are permanent, whether they are
/// recognised by kind or only by their rendered message.
pub fn should_retry(error: &AdapterError) -> bool {
    if matches!(
        error.kind(),
        AdapterErrorKind::NotFound
            | AdapterErrorKind::Validation
            | AdapterErrorKind::Cancelled
            | AdapterErrorKind::DeadlineExceeded
    ) {
        return false;
    }

    let rendered = error.to_string();
    !NON_RETRYABLE_PHRASES
        .iter()
        .any(|phrase| rendered.contains(phrase))
}
