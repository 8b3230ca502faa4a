//! Retry delays with full jitter
//!
//! Delay for retry `r` is drawn uniformly from `[0, min(base * 2^r, max))`.
//! Randomizing below the cap, rather than around it, keeps many in-flight
//! messages from retrying in lockstep after a shared failure.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Configuration for the backoff schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay cap doubles from this base (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the delay cap (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Retry counts at or past this value are a contract breach
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    8000
}

const fn default_max_retries() -> u32 {
    5
}

/// Jittered exponential backoff schedule.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
}

impl ExponentialBackoff {
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Compute the wait before retry `retry_count`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::BackoffExhausted`] for
    /// `retry_count >= max_retries`. The dispatch loop's retry budget must
    /// stay inside the backoff schedule, so hitting this is a configuration
    /// contract breach rather than a runtime condition.
    pub fn delay(&self, retry_count: u32) -> Result<Duration, DispatchError> {
        if retry_count >= self.config.max_retries {
            return Err(DispatchError::BackoffExhausted {
                retry_count,
                max_retries: self.config.max_retries,
            });
        }

        // min(base * 2^r, max), saturating so large retry counts cap cleanly
        let capped_ms = if retry_count >= 63 {
            self.config.max_delay_ms
        } else {
            self.config
                .base_delay_ms
                .saturating_mul(1u64 << retry_count)
                .min(self.config.max_delay_ms)
        };

        if capped_ms == 0 {
            return Ok(Duration::ZERO);
        }

        let jittered_ms = rand::rng().random_range(0..capped_ms);
        Ok(Duration::from_millis(jittered_ms))
    }
}
