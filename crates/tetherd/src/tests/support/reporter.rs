//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use tether_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::workers::WorkerPoolConfig;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// Worker pools started with the given blocking worker count.
    PoolsStarted(usize),
    /// Worker pools stopped.
    PoolsStopped,
    /// The listener is accepting connections.
    ListenerReady(SocketAddr),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn pools_started(&self, config: &WorkerPoolConfig) {
        self.record(HealthEvent::PoolsStarted(config.blocking_workers));
    }

    fn pools_stopped(&self) {
        self.record(HealthEvent::PoolsStopped);
    }

    fn listener_ready(&self, address: SocketAddr) {
        self.record(HealthEvent::ListenerReady(address));
    }
}
