//! Append-only attempt history
//!
//! Every delivery attempt, successful or not, is recorded against its message
//! id. Records are never rewritten; a new attempt always appends. History is
//! kept until explicitly cleared, so the ledger doubles as the query surface
//! for "what happened to message X".

use std::sync::Arc;

use dashmap::DashMap;

use courier_common::attempt::AttemptRecord;

/// Shared attempt history keyed by message id.
///
/// Cloning is cheap and every clone views the same records.
#[derive(Debug, Clone, Default)]
pub struct AttemptLedger {
    records: Arc<DashMap<String, Vec<AttemptRecord>>>,
}

impl AttemptLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the history of `id`
    pub fn record(&self, id: &str, record: AttemptRecord) {
        self.records.entry(id.to_string()).or_default().push(record);
    }

    /// Full attempt history for a message, in append order.
    ///
    /// Returns `None` for an id that was never submitted (or whose history
    /// was cleared).
    #[must_use]
    pub fn attempts(&self, id: &str) -> Option<Vec<AttemptRecord>> {
        self.records.get(id).map(|entry| entry.clone())
    }

    /// Most recent attempt for a message
    #[must_use]
    pub fn last_attempt(&self, id: &str) -> Option<AttemptRecord> {
        self.records
            .get(id)
            .and_then(|entry| entry.last().cloned())
    }

    /// Number of attempts recorded for a message
    #[must_use]
    pub fn attempt_count(&self, id: &str) -> usize {
        self.records.get(id).map_or(0, |entry| entry.len())
    }

    /// Drop the history of one message
    pub fn clear(&self, id: &str) {
        self.records.remove(id);
    }

    /// Drop all history
    pub fn clear_all(&self) {
        self.records.clear();
    }

    /// Number of message ids with recorded history
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any history is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use courier_common::attempt::{AttemptRecord, AttemptStatus};

    use super::AttemptLedger;

    #[test]
    fn records_append_in_order() {
        let ledger = AttemptLedger::new();

        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sending, 0));
        ledger.record(
            "m1",
            AttemptRecord::new("backend-one", AttemptStatus::Failed, 0).with_error("timeout"),
        );
        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sending, 1));
        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sent, 1));

        let attempts = ledger.attempts("m1").unwrap();
        assert_eq!(attempts.len(), 4);
        assert_eq!(attempts[0].status, AttemptStatus::Sending);
        assert_eq!(attempts[1].status, AttemptStatus::Failed);
        assert_eq!(attempts[1].error.as_deref(), Some("timeout"));
        assert_eq!(attempts[3].status, AttemptStatus::Sent);
        assert_eq!(attempts[3].retry_count, 1);
    }

    #[test]
    fn unknown_id_has_no_history() {
        let ledger = AttemptLedger::new();

        assert!(ledger.attempts("never-seen").is_none());
        assert!(ledger.last_attempt("never-seen").is_none());
        assert_eq!(ledger.attempt_count("never-seen"), 0);
    }

    #[test]
    fn last_attempt_tracks_the_tail() {
        let ledger = AttemptLedger::new();

        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sending, 0));
        assert_eq!(
            ledger.last_attempt("m1").unwrap().status,
            AttemptStatus::Sending
        );

        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sent, 0));
        assert_eq!(ledger.last_attempt("m1").unwrap().status, AttemptStatus::Sent);
        assert_eq!(ledger.attempt_count("m1"), 2);
    }

    #[test]
    fn clear_is_per_message() {
        let ledger = AttemptLedger::new();

        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sent, 0));
        ledger.record("m2", AttemptRecord::new("backend-one", AttemptStatus::Sent, 0));

        ledger.clear("m1");
        assert!(ledger.attempts("m1").is_none());
        assert!(ledger.attempts("m2").is_some());

        ledger.clear_all();
        assert!(ledger.is_empty());
    }

    #[test]
    fn clones_share_history() {
        let ledger = AttemptLedger::new();
        let view = ledger.clone();

        ledger.record("m1", AttemptRecord::new("backend-one", AttemptStatus::Sent, 0));
        assert_eq!(view.attempt_count("m1"), 1);
    }
}
