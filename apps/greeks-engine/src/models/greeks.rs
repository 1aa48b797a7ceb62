//! Greeks results and the explicit invalid marker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Name of a Greek sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GreekName {
    /// dV/dS.
    Delta,
    /// d2V/dS2.
    Gamma,
    /// dV/dt, reported per calendar day.
    Theta,
    /// dV/dsigma, reported per volatility point.
    Vega,
    /// dV/dr, reported per rate point.
    Rho,
}

impl GreekName {
    /// The five Greeks, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Delta,
        Self::Gamma,
        Self::Theta,
        Self::Vega,
        Self::Rho,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Gamma => "gamma",
            Self::Theta => "theta",
            Self::Vega => "vega",
            Self::Rho => "rho",
        }
    }
}

impl std::fmt::Display for GreekName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GreekName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(Self::Delta),
            "gamma" => Ok(Self::Gamma),
            "theta" => Ok(Self::Theta),
            "vega" => Ok(Self::Vega),
            "rho" => Ok(Self::Rho),
            other => Err(format!("unknown greek '{other}'")),
        }
    }
}

/// A computed value, or the marker for an out-of-domain result.
///
/// Never a silently wrong number: anything non-finite becomes `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GreekValue {
    /// Finite, in-domain value.
    Value(f64),
    /// The computation left its valid domain.
    Invalid,
}

impl GreekValue {
    /// Wrap a finite number, marking anything else invalid.
    #[must_use]
    pub fn finite(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Invalid
        }
    }

    /// Finite value clamped into `[lo, hi]`.
    #[must_use]
    pub fn clamped(value: f64, lo: f64, hi: f64) -> Self {
        if value.is_finite() {
            Self::Value(value.clamp(lo, hi))
        } else {
            Self::Invalid
        }
    }

    /// The number, if valid.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Invalid => None,
        }
    }

    /// True for the invalid marker.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

impl Serialize for GreekValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Invalid => serializer.serialize_str("invalid"),
        }
    }
}

/// Inputs a result was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreeksInputs {
    /// Underlying price.
    pub spot: f64,
    /// Strike.
    pub strike: f64,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
    /// Volatility as a decimal.
    pub volatility: f64,
    /// Risk-free rate as a decimal.
    pub risk_free_rate: f64,
}

/// Model price and requested Greeks for one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreeksResult {
    /// Theoretical price.
    pub price: GreekValue,
    /// Requested Greeks by name.
    pub greeks: BTreeMap<GreekName, GreekValue>,
    /// Inputs used.
    pub inputs: GreeksInputs,
}

impl GreeksResult {
    /// Look up one Greek.
    #[must_use]
    pub fn get(&self, name: GreekName) -> Option<GreekValue> {
        self.greeks.get(&name).copied()
    }

    /// True when any requested value is the invalid marker.
    #[must_use]
    pub fn has_invalid(&self) -> bool {
        self.price.is_invalid() || self.greeks.values().any(GreekValue::is_invalid)
    }
}
