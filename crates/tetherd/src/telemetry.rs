//! Structured logging for the daemon.
//!
//! Every module logs under its own `tetherd::<area>` target (`dispatch`,
//! `workers`, `transport`, `health` and so on), so the configured filter can
//! raise or silence one area, e.g. `info,tetherd::workers=debug`.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use tether_config::{Config, LogFormat};

static ACTIVE_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Handle describing the subscriber that is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber. The first configuration
    /// installed wins, so this may differ from a later config's format.
    #[must_use]
    pub fn format(&self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Subscriber settings derived from the daemon configuration.
#[derive(Debug)]
struct TelemetrySettings {
    filter: EnvFilter,
    format: LogFormat,
    ansi: bool,
}

impl TelemetrySettings {
    fn from_config(config: &Config) -> Result<Self, TelemetryError> {
        let filter =
            EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
                filter: config.log_filter().to_owned(),
                message: error.to_string(),
            })?;
        // JSON output goes to collectors, so colour only helps compact lines
        // on a terminal.
        let ansi = config.log_format() == LogFormat::Compact && io::stderr().is_terminal();
        Ok(Self {
            filter,
            format: config.log_format(),
            ansi,
        })
    }

    fn into_subscriber(self) -> Box<dyn Subscriber + Send + Sync> {
        let builder = fmt::Subscriber::builder()
            .with_env_filter(self.filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            // Worker threads are named per pool.
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(self.ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339());

        match self.format {
            LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
            LogFormat::Compact => Box::new(builder.compact().finish()),
        }
    }
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Later calls leave the installed subscriber alone and return a handle
/// describing it.
///
/// # Examples
///
/// ```rust
/// use tether_config::Config;
/// use tetherd::telemetry;
///
/// # fn main() -> Result<(), tetherd::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// assert_eq!(first, second);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or another
/// subscriber was installed outside this module.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let settings = TelemetrySettings::from_config(config)?;
    ACTIVE_FORMAT
        .get_or_try_init(|| {
            let format = settings.format;
            tracing::subscriber::set_global_default(settings.into_subscriber())
                .map_err(TelemetryError::Subscriber)?;
            Ok(format)
        })
        .map(|format| TelemetryHandle { format: *format })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn config_with(filter: &str, format: LogFormat) -> Config {
        Config {
            log_filter: filter.to_owned(),
            log_format: format,
            ..Config::default()
        }
    }

    #[rstest]
    fn invalid_filters_name_the_expression() {
        let config = config_with("tetherd::workers=loud", LogFormat::Json);

        match TelemetrySettings::from_config(&config) {
            Err(TelemetryError::Filter { filter, .. }) => {
                assert_eq!(filter, "tetherd::workers=loud");
            }
            other => panic!("expected a filter error, got {other:?}"),
        }
    }

    #[rstest]
    fn json_output_never_uses_colour() {
        let settings = TelemetrySettings::from_config(&config_with("info", LogFormat::Json))
            .expect("valid settings");

        assert_eq!(settings.format, LogFormat::Json);
        assert!(!settings.ansi);
    }

    #[rstest]
    fn invalid_filters_are_rejected_even_after_installation() {
        initialise(&Config::default()).expect("install telemetry");

        let error = initialise(&config_with("tetherd=nonsense", LogFormat::Compact))
            .expect_err("filter should be rejected");
        assert!(matches!(error, TelemetryError::Filter { .. }));
    }

    #[rstest]
    fn the_first_installed_format_wins() {
        let first = initialise(&Config::default()).expect("install telemetry");
        let second =
            initialise(&config_with("info", LogFormat::Compact)).expect("reuse telemetry");

        assert_eq!(first, second);
    }
}
