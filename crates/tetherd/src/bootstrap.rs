//! Daemon bootstrap orchestration.

use std::fmt;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use tether_config::{Config, ConfigError};

use crate::connection::ConnectionServices;
use crate::dispatch::{DispatchTable, DispatchTableBuilder, ExceptionFormatter, FailurePolicy, Invoker};
use crate::health::HealthReporter;
use crate::receivers::SystemReceiver;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{DispatchConnectionHandler, ListenerError, ListenerHandle, SocketListener};
use crate::workers::{NoopResources, PoolError, ResourceFactory, WorkerPoolConfig, WorkerPools};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no configuration can be produced.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a pre-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// Violated constraint.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Worker pools could not be started.
    #[error("failed to start worker pools: {source}")]
    Workers {
        /// Underlying pool error.
        #[source]
        source: PoolError,
    },
    /// The listener could not be bound or started.
    #[error("failed to start listener: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

/// Programmatic worker options that have no configuration-file form.
#[derive(Clone)]
pub struct WorkerOptions {
    resources: Arc<dyn ResourceFactory>,
    formatter: Option<ExceptionFormatter>,
}

impl WorkerOptions {
    /// Replaces the backing resource factory probed by worker health checks.
    #[must_use]
    pub fn with_resources(mut self, resources: Arc<dyn ResourceFactory>) -> Self {
        self.resources = resources;
        self
    }

    /// Replaces the formatter used for forwarded failure messages.
    #[must_use]
    pub fn with_formatter(mut self, formatter: ExceptionFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            resources: Arc::new(NoopResources),
            formatter: None,
        }
    }
}

impl fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("custom_formatter", &self.formatter.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
    invoker: Arc<Invoker>,
    pools: Arc<WorkerPools>,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Invoker shared by every connection.
    #[must_use]
    pub fn invoker(&self) -> &Arc<Invoker> {
        &self.invoker
    }

    /// Running worker pools.
    #[must_use]
    pub fn pools(&self) -> &Arc<WorkerPools> {
        &self.pools
    }

    /// Table builder seeded with the configured authentication default and
    /// the built-in system handlers.
    #[must_use]
    pub fn table_builder(&self) -> DispatchTableBuilder {
        DispatchTable::builder(self.config.default_auth_required).receiver(Arc::new(SystemReceiver))
    }

    /// Connection services over `table` using the daemon's invoker.
    #[must_use]
    pub fn services(&self, table: DispatchTable) -> ConnectionServices {
        ConnectionServices::new(Arc::new(table), Arc::clone(&self.invoker))
    }

    /// Binds the configured address and serves connections with `services`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Listener`] when binding or starting fails.
    pub fn serve(&self, services: ConnectionServices) -> Result<ListenerHandle, BootstrapError> {
        let listener = SocketListener::bind(&self.config.listen_host, self.config.listen_port)
            .map_err(|source| BootstrapError::Listener { source })?;
        let handler = Arc::new(DispatchConnectionHandler::new(
            services,
            self.config.max_frame_bytes,
        ));
        let handle = listener
            .start(handler)
            .map_err(|source| BootstrapError::Listener { source })?;
        self.reporter.listener_ready(handle.local_addr());
        Ok(handle)
    }

    /// Drains and stops the worker pools.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when a worker thread panicked.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        self.pools.shutdown()?;
        self.reporter.pools_stopped();
        Ok(())
    }
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first stage that fails. The reporter
/// sees the same error before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    options: WorkerOptions,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match start(loader, &reporter, options) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn start(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
    options: WorkerOptions,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Invalid { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;

    let WorkerOptions {
        resources,
        formatter,
    } = options;
    let mut policy = FailurePolicy::new(config.forward_exceptions);
    if let Some(formatter) = formatter {
        policy = policy.with_formatter(formatter);
    }
    let pool_config = WorkerPoolConfig::from_config(&config);
    let pools = WorkerPools::start(&pool_config, policy.clone(), resources)
        .map_err(|source| BootstrapError::Workers { source })?;
    reporter.pools_started(&pool_config);
    let pools = Arc::new(pools);
    let invoker = Arc::new(Invoker::new(policy, Arc::clone(&pools)));

    Ok(Daemon {
        config,
        telemetry,
        invoker,
        pools,
        reporter: Arc::clone(reporter),
    })
}
