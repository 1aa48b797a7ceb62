//! Log subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Error type for tracing initialization.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Level or directive string failed to parse.
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter {
        /// The offending filter.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Build the filter: `RUST_LOG` wins, else the configured level.
///
/// # Errors
///
/// Returns an error if the configured level is not a valid filter.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| TracingError::InvalidFilter {
        filter: config.level.clone(),
        message: e.to_string(),
    })
}

/// Install the global tracing subscriber.
///
/// `format` is `json` for structured output, anything else for human-readable
/// lines. Logs go to stderr so stdout stays free for envelopes.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber already exists.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if config.format.eq_ignore_ascii_case("json") {
        builder
            .json()
            .with_current_span(config.include_spans)
            .try_init()
    } else {
        builder.pretty().try_init()
    };

    result.map_err(|e| TracingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        // RUST_LOG takes precedence over the configured level
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "greeks_engine=verbose".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            build_filter(&config),
            Err(TracingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_default_level_parses() {
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }
}
