//! Fault-tolerant message dispatch.
//!
//! A [`DispatchService`] accepts messages once each (submissions are
//! deduplicated), queues them FIFO, and delivers every message through one of
//! several interchangeable [`DeliveryBackend`]s with bounded retries, jittered
//! backoff, per-backend circuit breaking, failover, and a global throughput
//! ceiling. Every attempt lands in an append-only ledger, which is the only
//! delivery status surface a caller gets.

pub mod backend;
pub mod backoff;
pub mod breaker;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod rate_limiter;
pub mod service;

pub use backend::{DeliveryBackend, SendError};
pub use breaker::CircuitState;
pub use error::DispatchError;
pub use service::{DispatchConfig, DispatchService};

pub use courier_common::attempt::{AttemptRecord, AttemptStatus};
pub use courier_common::message::Message;
