//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tether_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader that binds an ephemeral loopback port with one blocking worker.
#[derive(Debug, Default)]
pub struct TestConfigLoader;

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_host: "127.0.0.1".to_owned(),
            listen_port: 0,
            blocking_worker_count: 1,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
#[derive(Debug, Default)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("tetherd"),
            OsString::from("--listen-port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}

/// Loader that yields a configuration rejected by validation.
#[derive(Debug, Default)]
pub struct InvalidConfigLoader;

impl ConfigLoader for InvalidConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            health_check_interval_ms: 0,
            ..Config::default()
        })
    }
}
