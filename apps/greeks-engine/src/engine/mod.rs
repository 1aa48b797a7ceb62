//! Greeks engines and the guard that chooses between them.
//!
//! - [`VectorizedEngine`]: whole batch in one pass, the primary path
//! - [`ScalarEngine`]: option by option, the fallback path
//! - [`FallbackGuard`]: circuit breaker plus fallback policy over any
//!   [`BatchAttempt`]

mod batch;
mod error;
mod guard;
mod scalar;
mod vectorized;

pub use batch::{
    BatchOutput, BatchStats, MAX_TIME_TO_EXPIRY, MAX_VOLATILITY, OptionBatch, bounded_greek,
    bounded_price,
};
pub use error::{EngineError, GuardError};
pub use guard::{BatchAttempt, FallbackDecision, FallbackGuard};
pub use scalar::ScalarEngine;
pub use vectorized::{EngineStats, VectorizedEngine};

/// Guard over the two built-in engines.
pub type GreeksGuard = FallbackGuard<VectorizedEngine, ScalarEngine>;
