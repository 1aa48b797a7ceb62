//! Resilience patterns for the guarded engine path.

mod circuit_breaker;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitBreakerState,
};
