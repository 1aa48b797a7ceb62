//! Observability module for metrics and logging.
//!
//! This module provides instrumentation for the Greeks engine, including
//! Prometheus metrics export and tracing subscriber setup.

mod metrics;
mod logging;

pub use metrics::{
    MetricsConfig, MetricsError, circuit_breaker_state, init_metrics, record_batch,
    record_circuit_breaker_rejected, record_circuit_breaker_state, record_fallback_call,
    record_quote_staleness, record_tick_failure, record_underlying_resolution,
    record_vectorized_call,
};
pub use logging::{TracingError, build_filter, init_tracing};
