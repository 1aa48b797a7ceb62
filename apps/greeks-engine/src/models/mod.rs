//! Core domain models for the Greeks engine.
//!
//! Ticks and quotes flow in, descriptors are derived per tick, and a
//! `CalculationEnvelope` flows out.

mod envelope;
mod environment;
mod greeks;
mod option;
mod quote;

pub use envelope::{CalculationEnvelope, ComputationPath, EnvelopeMetadata};
pub use environment::Environment;
pub use greeks::{GreekName, GreekValue, GreeksInputs, GreeksResult};
pub use option::{OptionDescriptor, OptionType};
pub use quote::{
    TickSnapshot, UnderlyingQuote, VolatilityQuote, VolatilitySource, normalize_volatility,
};
