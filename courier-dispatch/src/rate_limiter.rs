//! Outbound throughput limiting
//!
//! A sliding-window limiter over the trailing sixty seconds: every granted
//! slot leaves a timestamp in the window, and once the window is full the
//! caller suspends until the oldest timestamp ages out. Suspension is
//! cooperative, blocking only the calling retry loop.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Width of the sliding window
const WINDOW: Duration = Duration::from_secs(60);

/// Configuration for the throughput limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum delivery attempts within any trailing sixty-second window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

const fn default_requests_per_minute() -> u32 {
    60
}

/// Sliding-window rate limiter shared by all in-flight retry loops.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    /// Grant timestamps within the trailing window, oldest first.
    /// Invariant: at most `limit` entries after any acquire completes;
    /// expired entries are pruned lazily on the next acquire.
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.requests_per_minute.max(1) as usize,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Acquire a delivery slot, suspending until one is available.
    ///
    /// Prunes timestamps older than the window, and when the window is full
    /// sleeps until the oldest grant ages out before taking its place. The
    /// grant timestamp is appended before returning in every case.
    pub async fn acquire(&self) {
        let deadline = {
            let mut window = self.window.lock();
            let now = Instant::now();

            while window
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) >= WINDOW)
            {
                window.pop_front();
            }

            if window.len() >= self.limit {
                window.front().map(|oldest| *oldest + WINDOW)
            } else {
                window.push_back(now);
                None
            }
        };

        let Some(deadline) = deadline else { return };

        let wait = deadline.saturating_duration_since(Instant::now());
        debug!(wait_secs = wait.as_secs_f64(), "Rate limit reached, waiting for a slot");
        tokio::time::sleep_until(deadline).await;

        let mut window = self.window.lock();
        window.pop_front();
        window.push_back(Instant::now());
    }

    /// Snapshot for monitoring and tests
    pub fn stats(&self) -> RateLimiterStats {
        let window = self.window.lock();
        RateLimiterStats {
            in_window: window.len(),
            limit: self.limit,
        }
    }
}

/// Rate limiter statistics
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    /// Grants currently retained in the trailing window
    pub in_window: usize,
    /// Configured window ceiling
    pub limit: usize,
}
