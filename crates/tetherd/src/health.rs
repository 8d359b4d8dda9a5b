//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use tether_config::Config;

use crate::bootstrap::BootstrapError;
use crate::workers::WorkerPoolConfig;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the worker pools are running.
    fn pools_started(&self, config: &WorkerPoolConfig);

    /// Invoked after the worker pools drained and stopped.
    fn pools_stopped(&self);

    /// Invoked once the listener accepts connections.
    fn listener_ready(&self, address: SocketAddr);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn pools_started(&self, config: &WorkerPoolConfig) {
        (**self).pools_started(config);
    }

    fn pools_stopped(&self) {
        (**self).pools_stopped();
    }

    fn listener_ready(&self, address: SocketAddr) {
        (**self).listener_ready(address);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen_address(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            default_auth_required = config.default_auth_required,
            forward_exceptions = config.forward_exceptions,
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn pools_started(&self, config: &WorkerPoolConfig) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pools_started",
            blocking_workers = config.blocking_workers,
            cooperative = config.cooperative_enabled,
            "worker pools ready"
        );
    }

    fn pools_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pools_stopped",
            "worker pools stopped"
        );
    }

    fn listener_ready(&self, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            %address,
            "listener accepting connections"
        );
    }
}
