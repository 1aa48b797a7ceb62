//! Configuration module for the Greeks engine.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation for all engine components. Every section has defaults, so
//! an empty document (`{}`) is a valid configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use greeks_engine::config::{Config, load_config};
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("model: {}", config.pricing.model);
//! ```

mod circuit_breaker;
mod engine;
mod environment;
mod observability;
mod pricing;
mod resolver;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use circuit_breaker::CircuitBreakerSettings;
pub use engine::{CacheConfig, EngineConfig};
pub use environment::EnvironmentConfig;
pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use pricing::PricingConfig;
pub use resolver::{ResolverConfig, VolatilityConfig};

use crate::engine::MAX_VOLATILITY;
use crate::pricing::IvSolverConfig;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Environment configuration.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Pricing model configuration.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Implied volatility solver configuration.
    #[serde(default)]
    pub iv_solver: IvSolverConfig,
    /// Volatility source configuration.
    #[serde(default)]
    pub volatility: VolatilityConfig,
    /// Underlying resolver configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Circuit breaker configuration.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Envelope caching configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.environment.environment()?;

    let rate = config.pricing.risk_free_rate;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::ValidationError(
            "risk_free_rate must be between 0.0 and 1.0".to_string(),
        ));
    }

    if config.pricing.greeks.is_empty() {
        return Err(ConfigError::ValidationError(
            "pricing.greeks must name at least one greek".to_string(),
        ));
    }

    let iv = &config.iv_solver;
    if iv.min_vol <= 0.0 {
        return Err(ConfigError::ValidationError(
            "iv_solver.min_vol must be positive".to_string(),
        ));
    }
    if iv.min_vol >= iv.max_vol {
        return Err(ConfigError::ValidationError(
            "iv_solver.min_vol must be below iv_solver.max_vol".to_string(),
        ));
    }
    if iv.max_vol > MAX_VOLATILITY {
        return Err(ConfigError::ValidationError(format!(
            "iv_solver.max_vol must not exceed the engine limit of {MAX_VOLATILITY}"
        )));
    }
    if iv.max_iterations == 0 || iv.tolerance <= 0.0 {
        return Err(ConfigError::ValidationError(
            "iv_solver.max_iterations and iv_solver.tolerance must be positive".to_string(),
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "circuit_breaker.failure_threshold must be at least 1".to_string(),
        ));
    }

    if config.resolver.cache_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.cache_capacity must be at least 1".to_string(),
        ));
    }

    if config.resolver.cache_max_age_ms > config.resolver.store_max_age_ms {
        tracing::warn!(
            cache_max_age_ms = config.resolver.cache_max_age_ms,
            store_max_age_ms = config.resolver.store_max_age_ms,
            "Recency cache window is longer than the store window"
        );
    }

    Ok(())
}
