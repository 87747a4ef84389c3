//! Logging setup for the batch binary.

use crate::config::LoggingConfig;
use crate::error::{RunnerError, RunnerResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter; the default is `info`.
/// Output goes to stderr so stdout carries only the report.
pub fn init_logging(config: &LoggingConfig) -> RunnerResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match &config.filter {
            Some(directive) => EnvFilter::try_new(directive).map_err(|e| {
                RunnerError::InvalidValue {
                    field: "logging.filter".to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => EnvFilter::new("info"),
        },
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| RunnerError::Logging(e.to_string()))
}
