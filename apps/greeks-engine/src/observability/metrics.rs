//! Prometheus metrics for the Greeks engine.
//!
//! Provides metrics for the vectorized and fallback paths, per-tick failures,
//! underlying resolution and circuit breakers. Recording is a no-op until a
//! recorder is installed with [`init_metrics`].
//!
//! # Example
//!
//! ```ignore
//! use greeks_engine::observability::{init_metrics, MetricsConfig};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config)?;
//!
//! record_vectorized_call("success");
//! ```

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Prometheus exporter settings.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Scrape endpoint address.
    pub listen_addr: SocketAddr,
    /// Batch latency histogram buckets, in seconds.
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            // Latency buckets from 10us to 100ms
            latency_buckets: vec![
                0.000_01, 0.000_05, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1,
            ],
        }
    }
}

impl MetricsConfig {
    /// Default buckets on a different address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Install the global Prometheus recorder and its scrape listener.
///
/// Needs a running Tokio runtime.
///
/// # Errors
///
/// Fails when the buckets are rejected or the listener cannot bind.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Metrics exporter listening"
    );

    Ok(())
}

/// Exporter setup errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Invalid exporter settings.
    #[error("invalid metrics exporter settings: {0}")]
    Configuration(String),
    /// Recorder or listener could not be installed.
    #[error("failed to install metrics exporter: {0}")]
    Installation(String),
}

// ============================================================================
// Engine Metrics
// ============================================================================

/// Record one guarded vectorized call.
///
/// # Arguments
///
/// * `status` - `"success"`, `"error"` or `"rejected"` (breaker open)
pub fn record_vectorized_call(status: &str) {
    counter!(
        "greeks_vectorized_calls_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one scalar fallback call.
///
/// # Arguments
///
/// * `status` - `"success"` or `"error"`
pub fn record_fallback_call(status: &str) {
    counter!(
        "greeks_fallback_calls_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed batch.
///
/// # Arguments
///
/// * `path` - `"vectorized"` or `"fallback"`
/// * `options` - Options in the batch
/// * `latency_seconds` - Wall time of the batch
pub fn record_batch(path: &str, options: usize, latency_seconds: f64) {
    counter!(
        "greeks_options_processed_total",
        "path" => path.to_string()
    )
    .increment(options as u64);

    histogram!(
        "greeks_batch_latency_seconds",
        "path" => path.to_string()
    )
    .record(latency_seconds);
}

// ============================================================================
// Tick Metrics
// ============================================================================

/// Record a tick that produced no envelope.
///
/// # Arguments
///
/// * `reason` - Error reason code (e.g. `"PARSE_ERROR"`)
pub fn record_tick_failure(reason: &str) {
    counter!(
        "greeks_tick_failures_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record which tier satisfied an underlying lookup.
///
/// # Arguments
///
/// * `tier` - `"cache"`, `"store"`, `"last_known_good"` or `"unavailable"`
pub fn record_underlying_resolution(tier: &str) {
    counter!(
        "greeks_underlying_resolution_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Set the age of the underlying quote last used for a symbol.
///
/// # Arguments
///
/// * `symbol` - Underlying symbol
/// * `staleness_seconds` - Age of the quote used, relative to the tick
pub fn record_quote_staleness(symbol: &str, staleness_seconds: f64) {
    gauge!(
        "greeks_quote_staleness_seconds",
        "symbol" => symbol.to_string()
    )
    .set(staleness_seconds);
}

// ============================================================================
// Circuit Breaker Metrics
// ============================================================================

/// Gauge values of `circuit_breaker_state`.
pub mod circuit_breaker_state {
    /// Calls flow to the guarded path.
    pub const CLOSED: f64 = 0.0;
    /// Calls are refused.
    pub const OPEN: f64 = 1.0;
    /// A probe call is allowed.
    pub const HALF_OPEN: f64 = 2.0;
}

/// Publish a breaker state change. `state` is one of the
/// [`circuit_breaker_state`] values.
pub fn record_circuit_breaker_state(service: &str, state: f64) {
    gauge!(
        "circuit_breaker_state",
        "service" => service.to_string()
    )
    .set(state);
}

/// Count a call refused by the breaker on `service`.
pub fn record_circuit_breaker_rejected(service: &str) {
    counter!(
        "circuit_breaker_rejected_total",
        "service" => service.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
