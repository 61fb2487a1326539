//! Structured logging.
//!
//! `RUST_LOG` wins over the configured filter when set. The output format is
//! JSON in production and pretty or compact for local work.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::{Result, TrackError};

/// Build the filter: `RUST_LOG` if present, otherwise the configured level.
pub fn env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|e| {
        TrackError::configuration(format!(
            "invalid observability.log_level '{}': {}",
            config.log_level, e
        ))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init(),
    };

    installed.map_err(|e| TrackError::configuration(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> ObservabilityConfig {
        ObservabilityConfig {
            log_level: level.to_string(),
            log_format: LogFormat::Compact,
            include_location: false,
            metrics_enabled: false,
        }
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter(&config("info,teachtrack_core=debug")).is_ok());
    }

    #[test]
    fn test_env_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter(&config("info,=[")).is_err());
    }
}
