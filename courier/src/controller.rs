use std::sync::{Arc, LazyLock};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use courier_common::{Message, Signal, internal, logging, tracing};
use courier_dispatch::{DeliveryBackend, DispatchConfig, DispatchService};

use crate::backends::{SimulatedBackend, SimulatedBackendConfig};

/// The top-level controller, deserialized from the RON config file.
#[derive(Debug, Deserialize)]
pub struct Courier {
    #[serde(alias = "backend")]
    backends: Vec<SimulatedBackendConfig>,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    traffic: TrafficConfig,
}

/// Demo traffic source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficConfig {
    /// Messages submitted before the source goes quiet
    #[serde(default = "default_message_count")]
    pub message_count: u32,

    /// Pause between submissions (milliseconds)
    #[serde(default = "default_submit_interval_ms")]
    pub submit_interval_ms: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            message_count: default_message_count(),
            submit_interval_ms: default_submit_interval_ms(),
        }
    }
}

const fn default_message_count() -> u32 {
    20
}

const fn default_submit_interval_ms() -> u64 {
    250
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("Interrupt received, finishing the in-flight message (interrupt again to force exit)");
        }
        _ = sigterm.recv() => {
            internal!("SIGTERM received, finishing the in-flight message");
        }
    };

    let mut acks = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| anyhow::anyhow!("No tasks listening for shutdown: {e}"))?;

    // Wait for the serving tasks to drop their receivers, unless the
    // operator interrupts a second time
    loop {
        tokio::select! {
            ack = acks.recv() => match ack {
                Err(broadcast::error::RecvError::Closed) => break,
                other => tracing::debug!("Shutdown acknowledgement: {other:?}"),
            },

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

/// Submit demo messages with generated ids until the count runs out
async fn submit_traffic(service: Arc<DispatchService>, traffic: TrafficConfig) {
    for n in 0..traffic.message_count {
        let message = Message::new(
            ulid::Ulid::new().to_string(),
            "demo@courier.local",
            format!("recipient-{n}@example.com"),
            format!("demo message {n}"),
            "generated by the courier demo traffic source",
        );
        service.submit(message);

        tokio::time::sleep(Duration::from_millis(traffic.submit_interval_ms)).await;
    }

    internal!(level = INFO, "Demo traffic source finished");
}

fn summarize(service: &DispatchService) {
    for (backend, stats) in service.breaker_stats() {
        internal!(
            level = INFO,
            "Backend {backend}: breaker {:?}, {} consecutive failures",
            stats.state,
            stats.consecutive_failures
        );
    }

    let rate = service.rate_limiter_stats();
    internal!(
        level = INFO,
        "Rate limiter: {}/{} slots used in the trailing window",
        rate.in_window,
        rate.limit
    );
}

impl Courier {
    /// Run this controller, and everything it controls
    ///
    /// # Errors
    ///
    /// This function will return an error if no delivery backends are
    /// configured, or if the dispatch worker fails.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let backends: Vec<Arc<dyn DeliveryBackend>> = self
            .backends
            .into_iter()
            .map(|config| Arc::new(SimulatedBackend::new(config)) as Arc<dyn DeliveryBackend>)
            .collect();
        let service = Arc::new(DispatchService::new(backends, &self.dispatch)?);

        let traffic = tokio::spawn(submit_traffic(Arc::clone(&service), self.traffic));

        let ret = tokio::select! {
            r = service.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = shutdown() => {
                r
            }
        };

        traffic.abort();
        summarize(&service);

        internal!("Shutting down...");

        ret
    }
}
