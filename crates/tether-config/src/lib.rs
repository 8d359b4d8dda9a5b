//! Shared configuration for the tether daemon.
//!
//! Values are layered by `ortho_config`: built-in defaults, configuration
//! files, `TETHER_*` environment variables and finally command-line flags.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_HEALTH_CHECK_INTERVAL_MS, DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES, default_auth_required,
    default_blocking_worker_count, default_cooperative_worker_enabled, default_forward_exceptions,
    default_health_check_interval_ms, default_listen_host, default_listen_port,
    default_log_filter, default_log_filter_string, default_log_format, default_max_frame_bytes,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration resolved from all configuration layers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// Host the daemon listener binds.
    #[serde(default = "default_listen_host")]
    #[ortho_config(default = default_listen_host())]
    pub listen_host: String,
    /// TCP port the daemon listener binds. Zero selects an ephemeral port.
    #[serde(default = "default_listen_port")]
    #[ortho_config(default = default_listen_port())]
    pub listen_port: u16,
    /// `tracing_subscriber::EnvFilter` expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Whether handlers require an authenticated identity unless they opt out.
    #[serde(default = "default_auth_required")]
    #[ortho_config(default = default_auth_required())]
    pub default_auth_required: bool,
    /// Whether handler failures are acknowledged to clients as typed errors.
    #[serde(default = "default_forward_exceptions")]
    #[ortho_config(default = default_forward_exceptions())]
    pub forward_exceptions: bool,
    /// Number of blocking worker threads. Zero disables the blocking pool.
    #[serde(default = "default_blocking_worker_count")]
    #[ortho_config(default = default_blocking_worker_count())]
    pub blocking_worker_count: usize,
    /// Whether the cooperative runner is started.
    #[serde(default = "default_cooperative_worker_enabled")]
    #[ortho_config(default = default_cooperative_worker_enabled())]
    pub cooperative_worker_enabled: bool,
    /// Idle interval after which workers probe their backing resource.
    #[serde(default = "default_health_check_interval_ms")]
    #[ortho_config(default = default_health_check_interval_ms())]
    pub health_check_interval_ms: u64,
    /// Largest inbound frame accepted before the connection is dropped.
    #[serde(default = "default_max_frame_bytes")]
    #[ortho_config(default = default_max_frame_bytes())]
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            default_auth_required: default_auth_required(),
            forward_exceptions: default_forward_exceptions(),
            blocking_worker_count: default_blocking_worker_count(),
            cooperative_worker_enabled: default_cooperative_worker_enabled(),
            health_check_interval_ms: default_health_check_interval_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Rejections raised when a loaded configuration is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The health check interval must be positive.
    #[error("health_check_interval_ms must be greater than zero")]
    ZeroHealthCheckInterval,
    /// Frames must be allowed to carry at least one byte.
    #[error("max_frame_bytes must be greater than zero")]
    ZeroFrameLimit,
    /// The listen host was blank.
    #[error("listen_host must not be empty")]
    EmptyListenHost,
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the `host:port` pair the listener binds.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// Returns the idle health check interval.
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Checks cross-field constraints that the loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_host.trim().is_empty() {
            return Err(ConfigError::EmptyListenHost);
        }
        if self.health_check_interval_ms == 0 {
            return Err(ConfigError::ZeroHealthCheckInterval);
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn defaults_pass_validation() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[rstest]
    #[case::blank_host(Config { listen_host: "  ".into(), ..Config::default() }, ConfigError::EmptyListenHost)]
    #[case::zero_interval(Config { health_check_interval_ms: 0, ..Config::default() }, ConfigError::ZeroHealthCheckInterval)]
    #[case::zero_frame(Config { max_frame_bytes: 0, ..Config::default() }, ConfigError::ZeroFrameLimit)]
    fn validation_rejects_inconsistent_values(#[case] config: Config, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[rstest]
    fn listen_address_joins_host_and_port() {
        let config = Config {
            listen_host: "0.0.0.0".into(),
            listen_port: 4100,
            ..Config::default()
        };
        assert_eq!(config.listen_address(), "0.0.0.0:4100");
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    fn log_format_parses_case_insensitively(#[case] raw: &str, #[case] expected: LogFormat) {
        assert_eq!(raw.parse::<LogFormat>(), Ok(expected));
    }
}
