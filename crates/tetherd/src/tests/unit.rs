//! Unit tests for the daemon bootstrap and process utilities.

use std::error::Error as _;
use std::sync::Arc;

use rstest::rstest;

use crate::bootstrap::{BootstrapError, WorkerOptions, bootstrap_with};
use crate::dispatch::{DispatchError, HandlerError, TaskOutcome};
use crate::process::launch::run_daemon_with;
use crate::process::{ShutdownError, ShutdownSignal};
use crate::workers::{Task, WorkerKind};

use super::support::{
    FailingConfigLoader, HealthEvent, InvalidConfigLoader, RecordingHealthReporter,
    TestConfigLoader,
};

struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

#[rstest]
fn bootstrap_starts_configured_pools() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&TestConfigLoader::new(), reporter.clone(), WorkerOptions::default())
        .expect("bootstrap should succeed");

    assert!(daemon.pools().is_enabled(WorkerKind::Blocking));
    assert!(daemon.pools().is_enabled(WorkerKind::Cooperative));
    assert_eq!(
        reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::PoolsStarted(1),
            HealthEvent::BootstrapSucceeded,
        ]
    );
}

#[rstest]
fn table_builder_registers_system_handlers() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&TestConfigLoader::new(), reporter, WorkerOptions::default())
        .expect("bootstrap should succeed");

    let table = daemon.table_builder().build();

    let bindings = table.lookup("ping");
    assert_eq!(bindings.len(), 1);
    assert!(!bindings.iter().any(|binding| binding.policy().requires_auth()));
}

#[rstest]
fn worker_options_install_the_exception_formatter() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let options = WorkerOptions::default().with_formatter(Arc::new(
        |error: &dyn std::error::Error| format!("service error: {error}"),
    ));

    let daemon = bootstrap_with(&TestConfigLoader::new(), reporter, options)
        .expect("bootstrap should succeed");

    let typed = daemon
        .invoker()
        .policy()
        .typed_task_error(&HandlerError::new("database offline"));
    assert_eq!(typed.message(), "service error: database offline");
    daemon.shutdown().expect("shutdown pools");
}

#[rstest]
fn configuration_errors_are_reported() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone(), WorkerOptions::default())
        .expect_err("bootstrap should fail");

    assert!(matches!(error, BootstrapError::Configuration { .. }));
    assert_eq!(
        reporter.events(),
        vec![
            HealthEvent::BootstrapStarting,
            HealthEvent::BootstrapFailed(error.to_string()),
        ]
    );
}

#[rstest]
fn invalid_configuration_is_rejected_before_pools_start() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&InvalidConfigLoader, reporter.clone(), WorkerOptions::default())
        .expect_err("bootstrap should fail");

    assert!(matches!(error, BootstrapError::Invalid { .. }));
    assert!(error.source().is_some());
    assert!(
        !reporter
            .events()
            .iter()
            .any(|event| matches!(event, HealthEvent::PoolsStarted(_)))
    );
}

#[rstest]
fn run_daemon_serves_until_shutdown() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    run_daemon_with(&TestConfigLoader::new(), reporter.clone(), &ImmediateShutdown)
        .expect("daemon should stop cleanly");

    let events = reporter.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, HealthEvent::ListenerReady(_)))
    );
    assert_eq!(events.last(), Some(&HealthEvent::PoolsStopped));
}

#[rstest]
fn submission_after_shutdown_is_reported() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&TestConfigLoader::new(), reporter, WorkerOptions::default())
        .expect("bootstrap should succeed");
    daemon.shutdown().expect("drain pools");

    let error = daemon
        .pools()
        .submit(Task::blocking(|| Ok(TaskOutcome::NoResult)))
        .expect_err("closed pools reject work");

    assert!(matches!(
        DispatchError::from(error),
        DispatchError::Submission(_)
    ));
}
