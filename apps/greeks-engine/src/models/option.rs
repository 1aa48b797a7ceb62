//! Option instrument description derived from an instrument key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Option right, using the exchange's CE/PE notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Call option (right to buy).
    #[serde(rename = "CE")]
    Call,
    /// Put option (right to sell).
    #[serde(rename = "PE")]
    Put,
}

impl OptionType {
    /// Exchange code for this option type.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }

    /// Returns true for calls.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, Self::Call)
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CE" | "C" | "CALL" => Ok(Self::Call),
            "PE" | "P" | "PUT" => Ok(Self::Put),
            other => Err(format!("unknown option type '{other}', expected CE or PE")),
        }
    }
}

/// Parsed option contract.
///
/// Immutable and derived per tick; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    /// Exchange code (e.g. "NSE").
    pub exchange: String,
    /// Underlying symbol (e.g. "RELIANCE").
    pub symbol: String,
    /// Instrument type segment of the key (e.g. "OPT").
    pub instrument_type: String,
    /// Strike price, strictly positive.
    pub strike: f64,
    /// Call or put.
    pub option_type: OptionType,
    /// Expiry date.
    pub expiry: NaiveDate,
}

impl OptionDescriptor {
    /// Key of the underlying used for quote lookups: `exchange@symbol@type`.
    #[must_use]
    pub fn underlying(&self) -> String {
        format!("{}@{}@{}", self.exchange, self.symbol, self.instrument_type)
    }
}
