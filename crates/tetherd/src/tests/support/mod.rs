//! Test harness utilities for the daemon behavioural suites.

mod auth;
mod client;
mod config_loader;
mod reporter;
mod world;

pub use auth::StaticTokenAuthenticator;
pub use client::{TestClient, correlation_id, message_type};
pub use config_loader::{FailingConfigLoader, InvalidConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
