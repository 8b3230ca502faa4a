//! Typed error handling for dispatch operations.
//!
//! Every failure here is absorbed inside the dispatch pipeline: submission is
//! fire-and-forget, so nothing propagates back to the submitter. The variants
//! distinguish how the retry loop reacts:
//! - retryable failures feed the retry/failover logic,
//! - `RetriesExhausted` is terminal for one message,
//! - `BackoffExhausted` signals a configuration contract breach, not a runtime
//!   condition.

use thiserror::Error;

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A message id was resubmitted within the deduplication window.
    /// Logged and dropped; never surfaced to the submitter.
    #[error("Duplicate submission: {0}")]
    Duplicate(String),

    /// A backend send failed. Triggers retry or failover.
    #[error("Send via {backend} failed: {reason}")]
    Send { backend: String, reason: String },

    /// The backend's circuit breaker rejected the call without executing it.
    /// Observed by the dispatch loop as a fail-over-now signal.
    #[error("Circuit breaker open for {backend}")]
    CircuitOpen { backend: String },

    /// The retry budget for a message ran out. Terminal; the message is
    /// dropped and the last error is logged.
    #[error("Delivery of {id} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        id: String,
        attempts: u32,
        last_error: String,
    },

    /// A backoff delay was requested for a retry count at or past the
    /// configured maximum. Indicates misconfiguration of the retry budget
    /// relative to the backoff schedule.
    #[error("Backoff exhausted: retry {retry_count} >= max {max_retries}")]
    BackoffExhausted { retry_count: u32, max_retries: u32 },

    /// A second worker tried to drain the queue of a service instance.
    #[error("Dispatch worker already running for this service")]
    AlreadyServing,

    /// The service was constructed without any delivery backends.
    #[error("No delivery backends configured")]
    NoBackends,
}

impl DispatchError {
    /// Returns `true` if the dispatch loop may try again after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Send { .. } | Self::CircuitOpen { .. })
    }

    /// Returns `true` if this error names a broken internal contract rather
    /// than a runtime delivery condition.
    #[must_use]
    pub const fn is_contract_breach(&self) -> bool {
        matches!(
            self,
            Self::BackoffExhausted { .. } | Self::AlreadyServing | Self::NoBackends
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchError;

    #[test]
    fn retryable_classification() {
        let send = DispatchError::Send {
            backend: "backend-one".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(send.is_retryable());

        let open = DispatchError::CircuitOpen {
            backend: "backend-one".to_string(),
        };
        assert!(open.is_retryable());

        let exhausted = DispatchError::RetriesExhausted {
            id: "m1".to_string(),
            attempts: 4,
            last_error: "connection refused".to_string(),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn contract_breach_classification() {
        let backoff = DispatchError::BackoffExhausted {
            retry_count: 5,
            max_retries: 5,
        };
        assert!(backoff.is_contract_breach());
        assert!(!backoff.is_retryable());

        assert!(DispatchError::AlreadyServing.is_contract_breach());
        assert!(!DispatchError::Duplicate("m1".to_string()).is_contract_breach());
    }

    #[test]
    fn error_display() {
        let error = DispatchError::Send {
            backend: "backend-two".to_string(),
            reason: "550 rejected".to_string(),
        };
        assert_eq!(error.to_string(), "Send via backend-two failed: 550 rejected");

        let error = DispatchError::RetriesExhausted {
            id: "m1".to_string(),
            attempts: 4,
            last_error: "timeout".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Delivery of m1 failed after 4 attempts: timeout"
        );
    }
}
