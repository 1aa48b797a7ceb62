//! Pricing model configuration.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::GreekName;
use crate::pricing::DEFAULT_EXPIRY_CUTOFF;

/// Pricing model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Active model name (`black_scholes` or `black76`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Risk-free rate (annualized).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Greeks computed for every tick.
    #[serde(default = "default_greeks")]
    pub greeks: Vec<GreekName>,
    /// Time of day (UTC) at which contracts expire.
    #[serde(default = "default_expiry_cutoff")]
    pub expiry_cutoff_utc: NaiveTime,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            risk_free_rate: default_risk_free_rate(),
            greeks: default_greeks(),
            expiry_cutoff_utc: default_expiry_cutoff(),
        }
    }
}

fn default_model() -> String {
    "black_scholes".to_string()
}

const fn default_risk_free_rate() -> f64 {
    0.065
}

fn default_greeks() -> Vec<GreekName> {
    GreekName::ALL.to_vec()
}

const fn default_expiry_cutoff() -> NaiveTime {
    DEFAULT_EXPIRY_CUTOFF
}

pub(crate) const fn default_true() -> bool {
    true
}
