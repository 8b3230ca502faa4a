//! Simulated delivery backends
//!
//! Stand-ins for real provider integrations: each one sleeps a random latency
//! and fails a configurable fraction of sends, which is enough to exercise
//! retries, breaker trips, and failover from the demo binary.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use courier_dispatch::{DeliveryBackend, Message, SendError};

/// Failure reasons a real provider might report
const FAILURE_REASONS: [&str; 4] = [
    "connection timeout",
    "rate limited by provider",
    "upstream service unavailable",
    "connection reset by peer",
];

/// Configuration for one simulated backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedBackendConfig {
    /// Backend identity; breaker and ledger key
    pub name: String,

    /// Fraction of sends that fail, in `[0.0, 1.0]`
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Lower latency bound per send (milliseconds)
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    /// Upper latency bound per send (milliseconds)
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

const fn default_failure_rate() -> f64 {
    0.2
}

const fn default_min_latency_ms() -> u64 {
    10
}

const fn default_max_latency_ms() -> u64 {
    150
}

/// A backend that simulates a flaky provider.
#[derive(Debug)]
pub struct SimulatedBackend {
    config: SimulatedBackendConfig,
}

impl SimulatedBackend {
    #[must_use]
    pub const fn new(config: SimulatedBackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeliveryBackend for SimulatedBackend {
    async fn send(&self, message: &Message) -> Result<(), SendError> {
        let latency_ms = {
            let min = self.config.min_latency_ms;
            let max = self.config.max_latency_ms.max(min);
            rand::rng().random_range(min..=max)
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        let (roll, reason_index) = {
            let mut rng = rand::rng();
            (
                rng.random::<f64>(),
                rng.random_range(0..FAILURE_REASONS.len()),
            )
        };

        if roll < self.config.failure_rate {
            return Err(SendError::new(FAILURE_REASONS[reason_index]));
        }

        trace!(
            backend = %self.config.name,
            id = %message.id,
            latency_ms,
            "Simulated send completed"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use courier_common::Message;

    use super::*;

    fn config(failure_rate: f64) -> SimulatedBackendConfig {
        SimulatedBackendConfig {
            name: "simulated".to_string(),
            failure_rate,
            min_latency_ms: 1,
            max_latency_ms: 5,
        }
    }

    fn message() -> Message {
        Message::new("m1", "a@example.org", "b@example.com", "hi", "body")
    }

    #[tokio::test(start_paused = true)]
    async fn zero_failure_rate_always_delivers() {
        let backend = SimulatedBackend::new(config(0.0));

        for _ in 0..20 {
            assert!(backend.send(&message()).await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_failure_rate_always_fails() {
        let backend = SimulatedBackend::new(config(1.0));

        for _ in 0..20 {
            let error = backend.send(&message()).await.unwrap_err();
            assert!(FAILURE_REASONS.contains(&error.reason.as_str()));
        }
    }

    #[test]
    fn name_is_stable() {
        let backend = SimulatedBackend::new(config(0.5));
        assert_eq!(backend.name(), "simulated");
    }
}
