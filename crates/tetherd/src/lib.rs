//! Message-dispatch and work-offload core for the tether protocol.
//!
//! Clients hold a long-lived connection and send typed envelopes. Each
//! envelope is decoded by the [`wire`] codec and routed by the
//! [`connection::ConnectionDispatcher`] to every handler bound to its type
//! tag in a [`dispatch::DispatchTable`]. The [`dispatch::Invoker`] checks the
//! binding's access policy, runs the handler, and either acknowledges inline
//! or hands a deferred [`workers::Task`] to the [`workers::WorkerPools`].
//!
//! Replies always travel through a [`context::CorrelationContext`], which
//! stamps the originating request's correlation id onto every message, so a
//! task finishing on a worker thread long after the request still answers the
//! right caller.
//!
//! The `tetherd` binary wires these pieces to a line-delimited JSON
//! [`transport`] over TCP. Bootstrap loads [`tether_config`], installs
//! structured telemetry, starts the pools and reports each stage through a
//! [`HealthReporter`].

mod bootstrap;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod groups;
mod health;
pub mod identity;
mod process;
pub mod receivers;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod wire;
pub mod workers;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, WorkerOptions,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
