//! Environment configuration that selects the fallback policy.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::Environment;

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Deployment mode: PRODUCTION or NON_PRODUCTION (aliases accepted).
    #[serde(default = "default_environment_mode")]
    pub mode: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            mode: default_environment_mode(),
        }
    }
}

impl EnvironmentConfig {
    /// Parse the configured mode.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown mode.
    pub fn environment(&self) -> Result<Environment, ConfigError> {
        self.mode.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "environment.mode must be PRODUCTION or NON_PRODUCTION, got '{}'",
                self.mode
            ))
        })
    }
}

fn default_environment_mode() -> String {
    "NON_PRODUCTION".to_string()
}
