//! Scripted delivery backends for integration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use courier_dispatch::{DeliveryBackend, Message, SendError};

/// A backend that plays back a script of outcomes, then repeats a default.
///
/// `true` entries succeed, `false` entries fail. Calls are counted so tests
/// can assert exactly how many sends reached the backend.
pub struct ScriptedBackend {
    name: &'static str,
    script: Mutex<VecDeque<bool>>,
    default_outcome: bool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn scripted(
        name: &'static str,
        script: impl IntoIterator<Item = bool>,
        default_outcome: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into_iter().collect()),
            default_outcome,
            calls: AtomicUsize::new(0),
        })
    }

    /// Succeeds on every call
    pub fn reliable(name: &'static str) -> Arc<Self> {
        Self::scripted(name, [], true)
    }

    /// Fails on every call
    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::scripted(name, [], false)
    }

    /// Number of sends that reached this backend
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryBackend for ScriptedBackend {
    async fn send(&self, message: &Message) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.default_outcome);

        if outcome {
            Ok(())
        } else {
            Err(SendError::new(format!(
                "simulated failure delivering {}",
                message.id
            )))
        }
    }

    fn name(&self) -> &str {
        self.name
    }
}
