//! Delivery attempt records
//!
//! Every delivery attempt appends one record to the ledger, keyed by message
//! id. Records are never mutated after append; the ordered sequence for an id
//! is the sole observable delivery status of a submitted message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single delivery attempt.
///
/// Serialized as one of the five lowercase strings (`"queued"`, `"sending"`,
/// `"sent"`, `"failed"`, `"cancelled"`) so outer layers can carry it losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Queued,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

impl AttemptStatus {
    /// Checks whether this status ends the attempt sequence for a message
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled)
    }
}

/// One entry in a message's attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Name of the backend the attempt was routed through
    pub backend: String,
    /// Outcome of the attempt
    pub status: AttemptStatus,
    /// Error text for failed attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the attempt was recorded
    pub timestamp: DateTime<Utc>,
    /// Zero-based attempt index within the message's retry loop
    pub retry_count: u32,
}

impl AttemptRecord {
    /// Create a record with the current timestamp and no error text
    #[must_use]
    pub fn new(backend: impl Into<String>, status: AttemptStatus, retry_count: u32) -> Self {
        Self {
            backend: backend.into(),
            status,
            error: None,
            timestamp: Utc::now(),
            retry_count,
        }
    }

    /// Attach error text to this record
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
