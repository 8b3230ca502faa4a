//! Submission deduplication
//!
//! Remembers when each message id was first accepted. The first submission of
//! an id in any retention window goes through; every resubmission inside that
//! window is reported as a duplicate without refreshing the timestamp, so the
//! id becomes submittable again a fixed interval after its first acceptance.
//! Stale entries are evicted lazily on the next lookup, never proactively.

use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Configuration for the deduplication cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a message id stays deduplicated after first acceptance (seconds)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
        }
    }
}

const fn default_retention_secs() -> u64 {
    86400 // 24 hours
}

/// First-seen cache keyed by message id.
#[derive(Debug)]
pub struct IdempotencyHandler {
    retention: Duration,
    first_seen: DashMap<String, Instant>,
}

impl IdempotencyHandler {
    #[must_use]
    pub fn new(config: &IdempotencyConfig) -> Self {
        Self {
            retention: Duration::from_secs(config.retention_secs),
            first_seen: DashMap::new(),
        }
    }

    /// Check whether this id was already accepted within the retention window.
    ///
    /// Fresh entries report `true` without touching the stored timestamp.
    /// Stale entries are replaced with a fresh one and report `false`, as
    /// does an id never seen before.
    pub fn is_duplicate(&self, id: &str) -> bool {
        let now = Instant::now();

        let fresh = self
            .first_seen
            .get(id)
            .is_some_and(|seen| now.duration_since(*seen) < self.retention);
        if fresh {
            return true;
        }

        // Unseen or stale: (re)record the first-seen timestamp
        self.first_seen.insert(id.to_string(), now);
        false
    }

    /// Number of ids currently cached, stale entries included
    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_submission_accepted_repeats_rejected() {
        let handler = IdempotencyHandler::new(&IdempotencyConfig::default());

        assert!(!handler.is_duplicate("m1"));
        assert!(handler.is_duplicate("m1"));
        assert!(handler.is_duplicate("m1"));
        assert_eq!(handler.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_ids_are_independent() {
        let handler = IdempotencyHandler::new(&IdempotencyConfig::default());

        assert!(!handler.is_duplicate("m1"));
        assert!(!handler.is_duplicate("m2"));
        assert!(handler.is_duplicate("m1"));
        assert!(handler.is_duplicate("m2"));
    }

    #[tokio::test(start_paused = true)]
    async fn id_submittable_again_after_retention() {
        let handler = IdempotencyHandler::new(&IdempotencyConfig { retention_secs: 3600 });

        assert!(!handler.is_duplicate("m1"));
        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(handler.is_duplicate("m1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!handler.is_duplicate("m1"));
        // The fresh acceptance starts a new window
        assert!(handler.is_duplicate("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_does_not_refresh_window() {
        let handler = IdempotencyHandler::new(&IdempotencyConfig { retention_secs: 100 });

        assert!(!handler.is_duplicate("m1"));
        tokio::time::advance(Duration::from_secs(60)).await;
        // Rejected, and the original timestamp stands
        assert!(handler.is_duplicate("m1"));

        tokio::time::advance(Duration::from_secs(40)).await;
        // 100 seconds since first acceptance: window over
        assert!(!handler.is_duplicate("m1"));
    }
}
