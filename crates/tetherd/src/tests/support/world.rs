//! BDD test world for the bootstrap suite: loader, reporter and daemon state.

use std::cell::RefCell;
use std::sync::Arc;

use serde_json::json;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, WorkerOptions, bootstrap_with};
use crate::transport::ListenerHandle;

use super::client::TestClient;
use super::config_loader::{FailingConfigLoader, InvalidConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    listener: Option<ListenerHandle>,
    client: Option<TestClient>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            listener: None,
            client: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader whose configuration fails validation.
    pub fn use_invalid_loader(&mut self) {
        self.loader = Box::new(InvalidConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }

        match bootstrap_with(
            &*self.loader,
            self.reporter.clone(),
            WorkerOptions::default(),
        ) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns true when the daemon handle is available.
    #[must_use]
    pub fn daemon_started(&self) -> bool {
        self.daemon.is_some()
    }

    /// Starts serving the default table and connects a client.
    pub fn serve(&mut self) {
        let daemon = self.daemon.as_ref().expect("daemon should be bootstrapped");
        let services = daemon.services(daemon.table_builder().build());
        let listener = daemon.serve(services).expect("serve daemon");
        self.client = Some(TestClient::connect(listener.local_addr()));
        self.listener = Some(listener);
    }

    /// Sends `ping` acknowledged under `id`.
    pub fn ping(&mut self, id: &str) {
        self.client
            .as_mut()
            .expect("client should be connected")
            .send("ping", Some(id), json!({}));
    }

    /// Connected client, if serving.
    #[must_use]
    pub fn client(&self) -> Option<&TestClient> {
        self.client.as_ref()
    }

    /// Stops the listener and drains the pools.
    pub fn shut_down(&mut self) {
        self.client = None;
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
            listener.join().expect("join listener");
        }
        if let Some(daemon) = self.daemon.as_ref() {
            daemon.shutdown().expect("drain pools");
        }
    }

    fn reset_results(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
