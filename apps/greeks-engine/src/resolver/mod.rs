//! Input resolution for a tick: underlying price and volatility.
//!
//! Both resolvers fail loudly. There is no default price and no default
//! volatility; a tick without fresh inputs produces a typed error.

mod underlying;
mod volatility;

use thiserror::Error;

use crate::store::StoreError;

pub use underlying::{ResolutionTier, ResolvedUnderlying, UnderlyingResolver};
pub use volatility::{IvInputs, VolatilityResolver};

/// Resolution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// No underlying quote close enough to the tick.
    #[error("underlying price unavailable for {symbol}: {reason}")]
    UnderlyingUnavailable {
        /// Underlying key.
        symbol: String,
        /// What was found instead.
        reason: String,
    },

    /// Neither the index nor the solver produced a volatility.
    #[error("volatility not found: {reason}")]
    VolatilityNotFound {
        /// Solver or source failure.
        reason: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
