//! Circuit-breaker guard with an environment-dependent fallback policy.
//!
//! [`FallbackGuard`] wraps any primary [`BatchAttempt`] in a circuit breaker
//! and decides what happens when the primary fails or the breaker is open:
//!
//! 1. Caller disabled fallback: fail fast with the primary error.
//! 2. Production environment: fail fast regardless of the caller flag.
//! 3. Otherwise: run the fallback attempt on the same input.
//!
//! Input errors reject the call outright. They say nothing about the health
//! of the primary path, so they are not counted by the breaker and never
//! trigger fallback.

use serde::Serialize;

use super::{EngineError, GuardError};
use crate::models::{ComputationPath, Environment};
use crate::observability::{record_fallback_call, record_vectorized_call};
use crate::resilience::{CircuitBreaker, CircuitBreakerSnapshot};

/// One way of processing a batch.
pub trait BatchAttempt<I: ?Sized>: Send + Sync {
    /// Result of a successful attempt.
    type Output;

    /// Path name for logs and errors.
    fn name(&self) -> &'static str;

    /// Process the input.
    ///
    /// # Errors
    ///
    /// Returns an `EngineError`; input errors are reported via
    /// [`EngineError::is_input_error`].
    fn attempt(&self, input: &I) -> Result<Self::Output, EngineError>;
}

/// What to do once the primary path is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackDecision {
    /// Caller asked for no fallback.
    DisabledByCaller,
    /// Production never serves from the fallback path.
    ProductionFailFast,
    /// Run the fallback path.
    UseFallback,
}

impl FallbackDecision {
    /// Apply the policy.
    #[must_use]
    pub const fn decide(allow_fallback: bool, environment: Environment) -> Self {
        if !allow_fallback {
            Self::DisabledByCaller
        } else if environment.is_production() {
            Self::ProductionFailFast
        } else {
            Self::UseFallback
        }
    }

    /// Reason attached to fail-fast errors.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::DisabledByCaller => "fallback disabled for production reliability",
            Self::ProductionFailFast => "fallback not permitted in production environment",
            Self::UseFallback => "fallback permitted",
        }
    }
}

enum PrimaryFailure {
    Rejected,
    Failed(EngineError),
}

/// Primary path behind a circuit breaker, with a policy-gated fallback.
#[derive(Debug)]
pub struct FallbackGuard<P, F> {
    primary: P,
    fallback: F,
    breaker: CircuitBreaker,
    environment: Environment,
}

impl<P, F> FallbackGuard<P, F> {
    /// Create a guard. The environment fixes the fallback policy for the
    /// guard's lifetime.
    #[must_use]
    pub const fn new(
        primary: P,
        fallback: F,
        breaker: CircuitBreaker,
        environment: Environment,
    ) -> Self {
        Self {
            primary,
            fallback,
            breaker,
            environment,
        }
    }

    /// Primary path.
    #[must_use]
    pub const fn primary(&self) -> &P {
        &self.primary
    }

    /// Circuit breaker around the primary path.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Breaker state and counters.
    #[must_use]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Environment the policy was built for.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Run the input through the primary path, or the fallback when the
    /// policy allows it.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when the primary path rejects the input
    /// - `CircuitOpen` when the breaker is open and fallback is not allowed
    /// - `Failed` when the primary path fails and fallback is not allowed
    /// - `FallbackFailed` when the fallback path fails too
    pub fn execute<I>(
        &self,
        input: &I,
        allow_fallback: bool,
    ) -> Result<(P::Output, ComputationPath), GuardError>
    where
        I: ?Sized,
        P: BatchAttempt<I>,
        F: BatchAttempt<I, Output = P::Output>,
    {
        let failure = match self.breaker.try_acquire() {
            None => {
                record_vectorized_call("rejected");
                PrimaryFailure::Rejected
            }
            Some(permit) => match self.primary.attempt(input) {
                Ok(output) => {
                    self.breaker.record_success(permit);
                    record_vectorized_call("success");
                    return Ok((output, ComputationPath::Vectorized));
                }
                Err(cause) if cause.is_input_error() => {
                    self.breaker.release(permit);
                    record_vectorized_call("invalid");
                    return Err(GuardError::InvalidInput {
                        path: self.primary.name().to_string(),
                        cause,
                    });
                }
                Err(cause) => {
                    self.breaker.record_failure(permit);
                    record_vectorized_call("error");
                    tracing::warn!(
                        path = self.primary.name(),
                        error = %cause,
                        "Primary path failed"
                    );
                    PrimaryFailure::Failed(cause)
                }
            },
        };

        let decision = FallbackDecision::decide(allow_fallback, self.environment);
        if decision != FallbackDecision::UseFallback {
            let path = self.primary.name().to_string();
            return Err(match failure {
                PrimaryFailure::Rejected => GuardError::CircuitOpen {
                    path,
                    reason: decision.reason(),
                },
                PrimaryFailure::Failed(cause) => GuardError::Failed {
                    path,
                    reason: decision.reason(),
                    cause,
                },
            });
        }

        tracing::warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            environment = %self.environment,
            "Serving batch from fallback path"
        );
        match self.fallback.attempt(input) {
            Ok(output) => {
                record_fallback_call("success");
                Ok((output, ComputationPath::Fallback))
            }
            Err(cause) => {
                record_fallback_call("error");
                Err(GuardError::FallbackFailed {
                    path: self.fallback.name().to_string(),
                    cause,
                })
            }
        }
    }
}
