//! The delivery backend capability
//!
//! A backend performs the actual send. The dispatch core assumes nothing about
//! a backend beyond this contract: variants are interchangeable, fallible, and
//! identified by a stable name that keys their circuit breaker and shows up in
//! ledger records.

use async_trait::async_trait;
use courier_common::Message;
use thiserror::Error;

/// Failure reported by a backend for a single send.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct SendError {
    /// Human-readable failure reason, recorded verbatim in the ledger
    pub reason: String,
}

impl SendError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An interchangeable delivery backend.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    /// Attempt to deliver the message.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] describing why delivery failed. The dispatch
    /// loop records the reason and decides between retry and failover; the
    /// backend itself must not retry.
    async fn send(&self, message: &Message) -> Result<(), SendError>;

    /// Stable identity for this backend, used as the breaker and ledger key.
    fn name(&self) -> &str;
}
