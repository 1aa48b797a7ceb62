//! Error taxonomy for the Greeks engine.
//!
//! Every failed tick surfaces as exactly one [`GreeksError`]. Component errors
//! convert into it, and each kind has a stable reason code used in logs and
//! as the `reason` label of `greeks_tick_failures_total`.
//!
//! | Code | Meaning |
//! |------|---------|
//! | `PARSE_ERROR` | Malformed instrument key |
//! | `UNSUPPORTED_MODEL` | Unknown pricing model at construction |
//! | `VOLATILITY_NOT_FOUND` | IV solver failed, no index volatility |
//! | `UNDERLYING_PRICE_UNAVAILABLE` | No sufficiently recent underlying quote |
//! | `GREEKS_CALCULATION_ERROR` | Engine failure, with or without fallback |
//! | `CIRCUIT_OPEN` | Breaker open and fallback disallowed |
//! | `CONFIG_ERROR` | Invalid configuration at startup |
//! | `STORE_ERROR` | Quote/cache store failure |

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::GuardError;
use crate::parser::ParseError;
use crate::pricing::UnsupportedModelError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

/// Typed failure of a Greeks calculation.
#[derive(Debug, Error)]
pub enum GreeksError {
    /// Malformed instrument key.
    #[error("failed to parse '{input}': {reason}")]
    Parse {
        /// Key that failed.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// Unknown pricing model name.
    #[error("unsupported pricing model '{name}'")]
    UnsupportedModel {
        /// Name that was requested.
        name: String,
    },

    /// No volatility could be determined.
    #[error("volatility not found: {reason}")]
    VolatilityNotFound {
        /// Why.
        reason: String,
    },

    /// No underlying quote close enough to the tick.
    #[error("underlying price unavailable for {symbol}: {reason}")]
    UnderlyingPriceUnavailable {
        /// Underlying key.
        symbol: String,
        /// Why.
        reason: String,
    },

    /// The engines failed.
    #[error("greeks calculation failed (fallback attempted: {fallback_attempted}): {cause}")]
    GreeksCalculation {
        /// Underlying engine error.
        cause: String,
        /// Whether the scalar fallback ran.
        fallback_attempted: bool,
    },

    /// Breaker open and fallback disallowed.
    #[error("circuit open for {path}: {reason}")]
    CircuitOpen {
        /// Guarded path.
        path: String,
        /// Why fallback was not used.
        reason: String,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GreeksError {
    /// Stable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnsupportedModel { .. } => "UNSUPPORTED_MODEL",
            Self::VolatilityNotFound { .. } => "VOLATILITY_NOT_FOUND",
            Self::UnderlyingPriceUnavailable { .. } => "UNDERLYING_PRICE_UNAVAILABLE",
            Self::GreeksCalculation { .. } => "GREEKS_CALCULATION_ERROR",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Parse failure for `input`.
    #[must_use]
    pub fn parse(input: &str, error: &ParseError) -> Self {
        Self::Parse {
            input: input.to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<UnsupportedModelError> for GreeksError {
    fn from(e: UnsupportedModelError) -> Self {
        Self::UnsupportedModel { name: e.name }
    }
}

impl From<ResolveError> for GreeksError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::UnderlyingUnavailable { symbol, reason } => {
                Self::UnderlyingPriceUnavailable { symbol, reason }
            }
            ResolveError::VolatilityNotFound { reason } => Self::VolatilityNotFound { reason },
            ResolveError::Store(e) => Self::Store(e),
        }
    }
}

impl From<GuardError> for GreeksError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::CircuitOpen { path, reason } => Self::CircuitOpen {
                path,
                reason: reason.to_string(),
            },
            GuardError::InvalidInput { path, cause } => Self::GreeksCalculation {
                cause: format!("{path}: {cause}"),
                fallback_attempted: false,
            },
            GuardError::Failed {
                path,
                reason,
                cause,
            } => Self::GreeksCalculation {
                cause: format!("{reason}: {path}: {cause}"),
                fallback_attempted: false,
            },
            GuardError::FallbackFailed { path, cause } => Self::GreeksCalculation {
                cause: format!("{path}: {cause}"),
                fallback_attempted: true,
            },
        }
    }
}
