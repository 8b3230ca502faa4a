//! Message dispatch service
//!
//! Owns the delivery pipeline: a deduplicated FIFO queue drained by a single
//! worker, a retry/failover loop per message, one circuit breaker per backend,
//! a shared rate limiter, and the append-only attempt ledger. Submission is
//! fire-and-forget; the ledger is the sole delivery status surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use courier_common::attempt::{AttemptRecord, AttemptStatus};
use courier_common::{Message, Signal, internal};

use crate::backend::DeliveryBackend;
use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::error::DispatchError;
use crate::idempotency::{IdempotencyConfig, IdempotencyHandler};
use crate::ledger::AttemptLedger;
use crate::rate_limiter::{RateLimitConfig, RateLimiter, RateLimiterStats};

/// Configuration for the dispatch service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Retries per message after the initial attempt
    pub retry: RetryConfig,
    /// Circuit breaker parameters, with per-backend overrides
    pub circuit_breaker: CircuitBreakerConfig,
    /// Outbound throughput ceiling
    pub rate_limit: RateLimitConfig,
    /// Backoff schedule between retries against the same backend
    pub backoff: BackoffConfig,
    /// Submission deduplication window
    pub idempotency: IdempotencyConfig,
}

/// Retry budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt, so a message gets at most
    /// `max_retries + 1` delivery attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

const fn default_max_retries() -> u32 {
    3
}

/// One configured backend with its dedicated breaker
struct BackendSlot {
    backend: Arc<dyn DeliveryBackend>,
    breaker: CircuitBreaker,
}

impl std::fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSlot")
            .field("backend", &self.backend.name())
            .field("breaker", &self.breaker)
            .finish()
    }
}

/// The dispatch pipeline.
///
/// Constructed once over an ordered set of backends. Messages enter through
/// [`submit`](Self::submit) and are drained by the single worker running
/// [`serve`](Self::serve); everything a caller can observe afterwards comes
/// from the attempt ledger.
#[derive(Debug)]
pub struct DispatchService {
    backends: Vec<BackendSlot>,
    /// Round-robin pointer advanced on failover. Backend health is a
    /// service-wide property, so the pointer is shared across messages.
    current_backend: AtomicUsize,
    rate_limiter: RateLimiter,
    backoff: ExponentialBackoff,
    idempotency: IdempotencyHandler,
    ledger: AttemptLedger,
    max_retries: u32,
    queue_tx: mpsc::UnboundedSender<Message>,
    queue_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    queued: AtomicUsize,
}

impl DispatchService {
    /// Build a service over the given backends, first backend preferred.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoBackends`] when `backends` is empty.
    pub fn new(
        backends: Vec<Arc<dyn DeliveryBackend>>,
        config: &DispatchConfig,
    ) -> Result<Self, DispatchError> {
        if backends.is_empty() {
            return Err(DispatchError::NoBackends);
        }

        let slots = backends
            .into_iter()
            .map(|backend| {
                let breaker_config = config.circuit_breaker.for_backend(backend.name());
                let breaker = CircuitBreaker::new(backend.name(), breaker_config);
                BackendSlot { backend, breaker }
            })
            .collect();

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        Ok(Self {
            backends: slots,
            current_backend: AtomicUsize::new(0),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            backoff: ExponentialBackoff::new(config.backoff.clone()),
            idempotency: IdempotencyHandler::new(&config.idempotency),
            ledger: AttemptLedger::new(),
            max_retries: config.retry.max_retries,
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            queued: AtomicUsize::new(0),
        })
    }

    /// Submit a message for delivery.
    ///
    /// Returns immediately. Duplicate ids within the deduplication window are
    /// logged and dropped without queueing; the original submission's history
    /// is untouched. Safe to call from any number of tasks.
    pub fn submit(&self, message: Message) {
        if self.idempotency.is_duplicate(&message.id) {
            let error = DispatchError::Duplicate(message.id.clone());
            warn!(id = %message.id, %error, "Dropping duplicate submission");
            return;
        }

        debug!(id = %message.id, recipient = %message.recipient, "Message queued");
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.queue_tx.send(message).is_err() {
            // Only reachable if the receiver half was dropped, which cannot
            // happen while the service owning it is alive
            self.queued.fetch_sub(1, Ordering::SeqCst);
            error!("Delivery queue receiver gone, message dropped");
        }
    }

    /// Drain the queue until shutdown, one message to completion at a time.
    ///
    /// This is the single delivery worker. An in-flight message's retry loop
    /// finishes before a shutdown signal is honored.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AlreadyServing`] when a worker is already
    /// draining this service instance.
    pub async fn serve(
        &self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), DispatchError> {
        let mut queue = self
            .queue_rx
            .try_lock()
            .map_err(|_| DispatchError::AlreadyServing)?;

        internal!(level = INFO, "Dispatch worker started");

        loop {
            tokio::select! {
                signal = shutdown.recv() => {
                    if matches!(signal, Ok(Signal::Shutdown) | Err(_)) {
                        internal!(level = INFO, "Dispatch worker shutting down");
                        break;
                    }
                }
                message = queue.recv() => {
                    let Some(message) = message else {
                        // All senders dropped; nothing more will arrive
                        break;
                    };
                    self.queued.fetch_sub(1, Ordering::SeqCst);

                    if let Err(error) = self.dispatch(message).await {
                        if error.is_contract_breach() {
                            return Err(error);
                        }
                        // Terminal per-message failures were already logged
                        // and recorded by the retry loop
                    }
                }
            }
        }

        Ok(())
    }

    /// Run one message's retry/failover loop to completion.
    async fn dispatch(&self, message: Message) -> Result<(), DispatchError> {
        let mut retry_count: u32 = 0;
        let mut last_error;

        loop {
            let index = self.current_backend.load(Ordering::SeqCst);
            let slot = &self.backends[index % self.backends.len()];
            let backend = slot.backend.name().to_string();

            self.rate_limiter.acquire().await;

            self.ledger.record(
                &message.id,
                AttemptRecord::new(&backend, AttemptStatus::Sending, retry_count),
            );

            let outcome = if slot.breaker.try_acquire() {
                match slot.backend.send(&message).await {
                    Ok(()) => {
                        slot.breaker.record_success();
                        Ok(())
                    }
                    Err(send_error) => {
                        slot.breaker.record_failure();
                        Err(DispatchError::Send {
                            backend: backend.clone(),
                            reason: send_error.to_string(),
                        })
                    }
                }
            } else {
                Err(DispatchError::CircuitOpen {
                    backend: backend.clone(),
                })
            };

            match outcome {
                Ok(()) => {
                    self.ledger.record(
                        &message.id,
                        AttemptRecord::new(&backend, AttemptStatus::Sent, retry_count),
                    );
                    info!(
                        id = %message.id,
                        backend = %backend,
                        retry_count,
                        "Message delivered"
                    );
                    return Ok(());
                }
                Err(attempt_error) => {
                    self.ledger.record(
                        &message.id,
                        AttemptRecord::new(&backend, AttemptStatus::Failed, retry_count)
                            .with_error(attempt_error.to_string()),
                    );
                    last_error = attempt_error.to_string();
                    retry_count += 1;

                    // An open breaker means this backend is down for everyone,
                    // so rotate even when this message is out of retries: the
                    // next message starts on the healthy backend.
                    let failed_over = if slot.breaker.state() == CircuitState::Open {
                        let next = (index + 1) % self.backends.len();
                        self.current_backend.store(next, Ordering::SeqCst);
                        warn!(
                            id = %message.id,
                            from = %backend,
                            to = %self.backends[next].backend.name(),
                            "Failing over to next backend"
                        );
                        true
                    } else {
                        false
                    };

                    if retry_count > self.max_retries {
                        let exhausted = DispatchError::RetriesExhausted {
                            id: message.id.clone(),
                            attempts: retry_count,
                            last_error,
                        };
                        error!(
                            id = %message.id,
                            attempts = retry_count,
                            %exhausted,
                            "Delivery abandoned"
                        );
                        return Err(exhausted);
                    }

                    // Retry immediately on the new backend, no backoff sleep
                    if failed_over {
                        continue;
                    }

                    match self.backoff.delay(retry_count) {
                        Ok(delay) => {
                            debug!(
                                id = %message.id,
                                retry_count,
                                delay_ms = delay.as_millis() as u64,
                                "Backing off before retry"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        Err(breach) => {
                            error!(id = %message.id, %breach, "Retry budget misconfigured");
                            return Err(breach);
                        }
                    }
                }
            }
        }
    }

    /// Full attempt history for a message id, `None` if never submitted
    #[must_use]
    pub fn attempts(&self, id: &str) -> Option<Vec<AttemptRecord>> {
        self.ledger.attempts(id)
    }

    /// Most recent attempt for a message id
    #[must_use]
    pub fn last_attempt(&self, id: &str) -> Option<AttemptRecord> {
        self.ledger.last_attempt(id)
    }

    /// Number of attempts recorded for a message id
    #[must_use]
    pub fn attempt_count(&self, id: &str) -> usize {
        self.ledger.attempt_count(id)
    }

    /// Whether the message's attempt sequence has ended in a terminal status.
    ///
    /// An abandoned message (retries exhausted) ends on `Failed`, which is
    /// not terminal, so this reports `false` for it.
    #[must_use]
    pub fn is_complete(&self, id: &str) -> bool {
        self.ledger
            .last_attempt(id)
            .is_some_and(|attempt| attempt.status.is_terminal())
    }

    /// Drop the recorded history of one message
    pub fn clear_history(&self, id: &str) {
        self.ledger.clear(id);
    }

    /// Drop all recorded history
    pub fn clear_all_history(&self) {
        self.ledger.clear_all();
    }

    /// Messages accepted but not yet picked up by the worker
    pub fn queue_len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Current breaker state for a backend, `None` for an unknown name
    #[must_use]
    pub fn breaker_state(&self, backend: &str) -> Option<CircuitState> {
        self.backends
            .iter()
            .find(|slot| slot.backend.name() == backend)
            .map(|slot| slot.breaker.state())
    }

    /// Breaker statistics for every configured backend
    pub fn breaker_stats(&self) -> Vec<(String, CircuitBreakerStats)> {
        self.backends
            .iter()
            .map(|slot| (slot.backend.name().to_string(), slot.breaker.stats()))
            .collect()
    }

    /// Rate limiter statistics
    pub fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.rate_limiter.stats()
    }
}
