pub mod attempt;
pub mod logging;
pub mod message;

pub use attempt::{AttemptRecord, AttemptStatus};
pub use message::Message;
pub use tracing;

/// Lifecycle signal broadcast to every serving task.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}
