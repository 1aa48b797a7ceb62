//! Fully assembled per-tick calculation output.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GreeksResult, OptionDescriptor, VolatilityQuote};

/// Which engine produced the Greeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationPath {
    /// Batch engine.
    Vectorized,
    /// Per-option scalar engine.
    Fallback,
}

impl ComputationPath {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vectorized => "vectorized",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ComputationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeMetadata {
    /// Currency of the tick.
    pub currency: String,
    /// Exchange timezone of the tick.
    pub timezone: String,
    /// Pricing model name.
    pub model: String,
    /// Engine that produced the numbers.
    pub path: ComputationPath,
}

/// Complete result for one tick. Never emitted partially populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationEnvelope {
    /// Unique id of this calculation.
    pub calculation_id: Uuid,
    /// Instrument key from the tick.
    pub instrument: String,
    /// Parsed contract.
    pub descriptor: OptionDescriptor,
    /// Tick observation time.
    pub tick_timestamp: DateTime<Utc>,
    /// Timestamp of the underlying quote used.
    pub underlying_timestamp: DateTime<Utc>,
    /// Time the calculation finished.
    pub computed_at: DateTime<Utc>,
    /// Observed option price.
    pub option_price: Decimal,
    /// Underlying price used.
    pub underlying_price: Decimal,
    /// Volatility used.
    pub volatility: VolatilityQuote,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
    /// Model price and Greeks.
    pub result: GreeksResult,
    /// Descriptive metadata.
    pub metadata: EnvelopeMetadata,
}
