//! Engine and guard errors.

use thiserror::Error;

/// Errors from a Greeks engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The batch failed validation; nothing was computed.
    #[error("invalid batch: {reason}")]
    InvalidBatch {
        /// What was wrong.
        reason: String,
    },

    /// The engine produced non-finite intermediates.
    #[error("numerical failure at row {row}: {reason}")]
    Numerical {
        /// Row that failed.
        row: usize,
        /// What was non-finite.
        reason: String,
    },
}

impl EngineError {
    /// True when the input was at fault rather than the engine.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidBatch { .. })
    }
}

/// Errors from the guarded primary/fallback execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardError {
    /// Breaker was open and fallback is not permitted.
    #[error("circuit open for {path}: {reason}")]
    CircuitOpen {
        /// Guarded path.
        path: String,
        /// Why fallback was not used.
        reason: &'static str,
    },

    /// The batch was rejected before any engine ran.
    #[error("{path} rejected input: {cause}")]
    InvalidInput {
        /// Path that validated the batch.
        path: String,
        /// Validation error.
        cause: EngineError,
    },

    /// The primary path failed and fallback is not permitted.
    #[error("{path} failed ({reason}): {cause}")]
    Failed {
        /// Guarded path.
        path: String,
        /// Why fallback was not used.
        reason: &'static str,
        /// Primary path error.
        cause: EngineError,
    },

    /// The primary path failed or was skipped, and so did the fallback.
    #[error("fallback {path} failed: {cause}")]
    FallbackFailed {
        /// Fallback path.
        path: String,
        /// Fallback error.
        cause: EngineError,
    },
}

impl GuardError {
    /// True when the fallback engine was invoked.
    #[must_use]
    pub const fn fallback_attempted(&self) -> bool {
        matches!(self, Self::FallbackFailed { .. })
    }
}
