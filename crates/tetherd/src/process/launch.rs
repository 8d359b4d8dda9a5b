//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, WorkerOptions, bootstrap_with};
use crate::health::HealthReporter;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap fails or shutdown is unclean.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, &SystemShutdownSignal)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(
    loader: &L,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &S,
) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let daemon = bootstrap_with(loader, reporter, WorkerOptions::default())?;
    info!(
        target: PROCESS_TARGET,
        listen = %daemon.config().listen_address(),
        "starting daemon runtime"
    );
    let services = daemon.services(daemon.table_builder().build());
    let listener = daemon.serve(services)?;
    shutdown.wait()?;
    listener.shutdown();
    listener.join()?;
    daemon.shutdown()?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
