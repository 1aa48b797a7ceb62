// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Greeks Engine - Rust Core Library
//!
//! Real-time option Greeks (delta, gamma, theta, vega, rho) and volatility
//! for a stream of market ticks.
//!
//! # Pipeline
//!
//! For each [`TickSnapshot`](models::TickSnapshot) the
//! [`GreeksOrchestrator`](orchestrator::GreeksOrchestrator):
//!
//! 1. parses the instrument key into an `OptionDescriptor`
//! 2. resolves the underlying price (recency cache → store → last-known-good)
//! 3. computes time-to-expiry
//! 4. resolves volatility (index volatility, else implied from the tick price)
//! 5. runs the vectorized engine behind a circuit breaker, falling back to the
//!    scalar engine only outside production
//! 6. assembles and caches a `CalculationEnvelope`
//!
//! Every tick yields a complete envelope or one typed [`GreeksError`].
//!
//! # Modules
//!
//! - `parser`: instrument key parsing
//! - `pricing`: pricing models, time-to-expiry, implied volatility
//! - `engine`: batch validation, vectorized and scalar engines, fallback guard
//! - `resilience`: circuit breaker
//! - `resolver`: underlying price and volatility resolution
//! - `store`: quote/cache store port and in-memory adapter
//! - `config`: YAML configuration with env interpolation
//! - `observability`: metrics and log subscriber

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading and validation.
pub mod config;

/// Batch engines and the fallback guard.
pub mod engine;

/// Error taxonomy.
pub mod error;

/// Domain models.
pub mod models;

/// Metrics and logging.
pub mod observability;

/// Per-tick pipeline.
pub mod orchestrator;

/// Instrument key parser.
pub mod parser;

/// Pricing math.
pub mod pricing;

/// Circuit breaker.
pub mod resilience;

/// Underlying and volatility resolution.
pub mod resolver;

/// Quote/cache store port.
pub mod store;

pub use config::{Config, ConfigError, load_config, load_config_from_string};
pub use error::GreeksError;
pub use models::{
    CalculationEnvelope, ComputationPath, Environment, GreekName, GreekValue, GreeksResult,
    OptionDescriptor, OptionType, TickSnapshot, UnderlyingQuote, VolatilityQuote,
};
pub use orchestrator::GreeksOrchestrator;
pub use parser::{ParseError, parse_option_key};
pub use pricing::{PricingModel, time_to_expiry};
pub use store::{InMemoryQuoteStore, QuoteStore};
