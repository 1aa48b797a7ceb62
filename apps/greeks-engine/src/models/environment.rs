//! Running environment that selects the fallback policy.

use serde::{Deserialize, Serialize};

/// Running environment (PRODUCTION or NON_PRODUCTION).
///
/// Injected into the fallback guard at construction so both policies can be
/// exercised deterministically; never read from ambient process state by the
/// library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Production - a failed vectorized path fails the tick.
    Production,
    /// Development, staging, paper and test deployments.
    #[default]
    NonProduction,
}

impl Environment {
    /// Returns true if this is the production environment.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "PRODUCTION"),
            Self::NonProduction => write!(f, "NON_PRODUCTION"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "PRODUCTION" | "PROD" | "LIVE" => Ok(Self::Production),
            "NON_PRODUCTION" | "NONPROD" | "DEV" | "DEVELOPMENT" | "STAGING" | "PAPER"
            | "TEST" => Ok(Self::NonProduction),
            _ => Err(format!(
                "Invalid environment: {s}. Must be PRODUCTION or NON_PRODUCTION."
            )),
        }
    }
}
