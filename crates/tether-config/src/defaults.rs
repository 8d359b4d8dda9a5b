//! Built-in defaults applied when no configuration layer supplies a value.

use crate::logging::LogFormat;

/// Host the daemon binds when none is configured.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// TCP port the daemon binds when none is configured.
pub const DEFAULT_LISTEN_PORT: u16 = 9780;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Interval between idle resource health checks, in milliseconds.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 10_000;

/// Largest inbound frame accepted on a connection.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned listen host used by serde defaults.
pub fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

/// Default listen port.
pub fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

/// Handlers require authentication unless they opt out.
pub fn default_auth_required() -> bool {
    true
}

/// Whether handler failures are forwarded to clients by default.
pub fn default_forward_exceptions() -> bool {
    false
}

/// Blocking worker threads started by default. Zero disables the pool.
pub fn default_blocking_worker_count() -> usize {
    0
}

/// Whether the cooperative runner starts by default.
pub fn default_cooperative_worker_enabled() -> bool {
    true
}

/// Default idle health check interval.
pub fn default_health_check_interval_ms() -> u64 {
    DEFAULT_HEALTH_CHECK_INTERVAL_MS
}

/// Default frame size ceiling.
pub fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
