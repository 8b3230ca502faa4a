//! Per-backend circuit breaker
//!
//! Stops routing sends to a backend that keeps failing, and probes it for
//! recovery after a cool-down.
//!
//! # States
//!
//! - **Closed**: normal operation, calls execute; consecutive failures are
//!   counted and a success resets the count.
//! - **Open**: calls are rejected without executing until `reset_timeout` has
//!   elapsed since the trip; the next acquire after that moves to half-open
//!   and is allowed through.
//! - **Half-open**: calls are allowed while the probe failure count stays
//!   below `half_open_attempts`; reaching the threshold re-trips to open, a
//!   success closes the breaker.
//!
//! The breaker never queues rejected calls. The dispatch loop observes an
//! open breaker synchronously and fails over to the next backend instead.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to trip the breaker open
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// How long the breaker stays open before probing recovery (seconds)
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,

    /// Failures tolerated while probing in half-open before re-tripping
    #[serde(default = "default_half_open_attempts")]
    pub half_open_attempts: u32,

    /// Per-backend overrides, keyed by backend name
    #[serde(default)]
    pub backend_overrides: ahash::AHashMap<String, BackendCircuitBreakerConfig>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            reset_timeout_secs: default_reset_timeout_secs(),
            half_open_attempts: default_half_open_attempts(),
            backend_overrides: ahash::AHashMap::default(),
        }
    }
}

const fn default_max_failures() -> u32 {
    5
}

const fn default_reset_timeout_secs() -> u64 {
    60
}

const fn default_half_open_attempts() -> u32 {
    3
}

impl CircuitBreakerConfig {
    /// Resolve the effective parameters for one backend
    #[must_use]
    pub fn for_backend(&self, name: &str) -> BackendCircuitBreakerConfig {
        self.backend_overrides.get(name).cloned().unwrap_or(
            BackendCircuitBreakerConfig {
                max_failures: self.max_failures,
                reset_timeout_secs: self.reset_timeout_secs,
                half_open_attempts: self.half_open_attempts,
            },
        )
    }
}

/// Per-backend circuit breaker parameter override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCircuitBreakerConfig {
    /// Trip threshold for this backend
    pub max_failures: u32,
    /// Cool-down for this backend (seconds)
    pub reset_timeout_secs: u64,
    /// Probe failure tolerance for this backend
    pub half_open_attempts: u32,
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls execute
    Closed,
    /// Tripped, calls rejected without executing
    Open,
    /// Probing recovery, limited calls allowed
    HalfOpen,
}

#[derive(Debug)]
struct BreakerData {
    /// Current state of the circuit
    state: CircuitState,
    /// Consecutive failures observed while closed
    consecutive_failures: u32,
    /// Failures observed during the current half-open probe window
    half_open_failures: u32,
    /// When the breaker last tripped open. Invariant: `Some` whenever
    /// `state == Open`.
    opened_at: Option<Instant>,
    config: BackendCircuitBreakerConfig,
}

impl BreakerData {
    const fn new(config: BackendCircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_failures: 0,
            opened_at: None,
            config,
        }
    }

    fn reset_timeout_expired(&self) -> bool {
        self.opened_at.is_some_and(|opened_at| {
            let timeout = Duration::from_secs(self.config.reset_timeout_secs);
            Instant::now().duration_since(opened_at) >= timeout
        })
    }

    /// Check whether a call may execute, transitioning open breakers to
    /// half-open once the cool-down has elapsed.
    fn try_acquire(&mut self, backend: &str) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if self.reset_timeout_expired() {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_failures = 0;
                    info!(
                        backend = %backend,
                        "Circuit breaker entering half-open state, probing recovery"
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a failed call.
    ///
    /// Returns `true` if the breaker transitioned to open.
    fn record_failure(&mut self, backend: &str) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;

                if self.consecutive_failures >= self.config.max_failures {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                    warn!(
                        backend = %backend,
                        failures = self.consecutive_failures,
                        threshold = self.config.max_failures,
                        reset_timeout_secs = self.config.reset_timeout_secs,
                        "Circuit breaker OPENED, rejecting sends to this backend"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_failures += 1;

                if self.half_open_failures >= self.config.half_open_attempts {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(Instant::now());
                    warn!(
                        backend = %backend,
                        probe_failures = self.half_open_failures,
                        "Circuit breaker probe failed, reopening circuit"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::Open => false,
        }
    }

    /// Record a successful call.
    ///
    /// Returns `true` if the breaker transitioned to closed (recovered).
    fn record_success(&mut self, backend: &str) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                false
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.consecutive_failures = 0;
                self.half_open_failures = 0;
                self.opened_at = None;
                info!(
                    backend = %backend,
                    "Circuit breaker CLOSED, normal operation resumed"
                );
                true
            }
            CircuitState::Open => {
                warn!(backend = %backend, "Unexpected success while circuit is open");
                false
            }
        }
    }
}

/// Circuit breaker for a single backend.
///
/// Created once per backend at service construction and shared across all
/// messages: backend health is a service-wide property.
#[derive(Debug)]
pub struct CircuitBreaker {
    backend: String,
    data: Mutex<BreakerData>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state
    #[must_use]
    pub fn new(backend: impl Into<String>, config: BackendCircuitBreakerConfig) -> Self {
        Self {
            backend: backend.into(),
            data: Mutex::new(BreakerData::new(config)),
        }
    }

    /// Check whether a call may execute right now.
    ///
    /// Returns `false` only while the breaker is open and the cool-down has
    /// not yet elapsed; the first acquire after the cool-down transitions the
    /// breaker to half-open and is allowed through.
    pub fn try_acquire(&self) -> bool {
        self.data.lock().try_acquire(&self.backend)
    }

    /// Record a failed call.
    ///
    /// Returns `true` if this failure tripped the breaker open.
    pub fn record_failure(&self) -> bool {
        self.data.lock().record_failure(&self.backend)
    }

    /// Record a successful call.
    ///
    /// Returns `true` if the breaker recovered to closed.
    pub fn record_success(&self) -> bool {
        self.data.lock().record_success(&self.backend)
    }

    /// Current state, as last observed by a call
    pub fn state(&self) -> CircuitState {
        self.data.lock().state
    }

    /// The backend this breaker gates
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Snapshot for monitoring and tests
    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            state: data.state,
            consecutive_failures: data.consecutive_failures,
            half_open_failures: data.half_open_failures,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current circuit state
    pub state: CircuitState,
    /// Consecutive failures while closed
    pub consecutive_failures: u32,
    /// Failures in the current half-open probe window
    pub half_open_failures: u32,
}
