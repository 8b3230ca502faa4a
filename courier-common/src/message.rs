//! The message record accepted for dispatch
//!
//! A message is immutable once submitted: the dispatch core owns it only while
//! it sits in the queue, and its attempt history lives on independently in the
//! ledger, keyed by the caller-supplied id.

use serde::{Deserialize, Serialize};

/// A message queued for delivery through one of the configured backends.
///
/// The `id` is supplied by the caller and is the key for both deduplication
/// and attempt-history lookups. Submitting two messages with the same id
/// within the deduplication window delivers only the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Caller-supplied identity, used for deduplication and ledger keying
    pub id: String,
    /// Originating address
    pub sender: String,
    /// Destination address
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

impl Message {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Message;

    #[test]
    fn roundtrip() {
        let message = Message::new("m1", "a@example.com", "b@example.com", "hello", "world");

        let serialized = serde_json::to_string(&message).unwrap();
        let deserialized: Message = serde_json::from_str(&serialized).unwrap();

        assert_eq!(message, deserialized);
        assert_eq!(deserialized.id, "m1");
    }
}
