//! Pricing model adapter.
//!
//! Exactly one model is active per adapter, chosen by name at construction.
//! Both supported models are cases of the generalized Black-Scholes-Merton
//! formula with cost of carry `b`:
//!
//! - `black_scholes`: spot underlying, `b = r`
//! - `black76`: futures/forward underlying, `b = 0`
//!
//! All functions are pure and return raw sensitivities (theta per year, vega
//! per 1.0 of volatility, rho per 1.0 of rate). Reporting units are applied by
//! [`reported`].

// Black-Scholes uses standard mathematical notation (s, k, t, r, sigma)
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{GreekName, OptionType};

/// Calendar days used to express theta per day.
pub const THETA_DAYS: f64 = 365.0;

/// Unknown pricing model name. Fatal at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported pricing model '{name}' (expected black_scholes or black76)")]
pub struct UnsupportedModelError {
    /// Name that was requested.
    pub name: String,
}

/// Supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Black-Scholes on spot.
    BlackScholes,
    /// Black (1976) on futures.
    Black76,
}

impl ModelKind {
    /// Canonical name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BlackScholes => "black_scholes",
            Self::Black76 => "black76",
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = UnsupportedModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black_scholes" | "black-scholes" | "blackscholes" | "bs" => Ok(Self::BlackScholes),
            "black76" | "black_76" | "black-76" => Ok(Self::Black76),
            _ => Err(UnsupportedModelError {
                name: s.to_string(),
            }),
        }
    }
}

/// Standard normal CDF.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Convert a raw sensitivity into its reporting unit.
///
/// Theta per calendar day, vega and rho per percentage point.
#[must_use]
pub fn reported(name: GreekName, raw: f64) -> f64 {
    match name {
        GreekName::Delta | GreekName::Gamma => raw,
        GreekName::Theta => raw / THETA_DAYS,
        GreekName::Vega | GreekName::Rho => raw / 100.0,
    }
}

/// Intermediate quantities shared by the price and every Greek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTerms {
    kind: ModelKind,
    s: f64,
    k: f64,
    t: f64,
    sigma: f64,
    r: f64,
    /// `b - r`, where `b` is the cost of carry.
    carry_minus_rate: f64,
    /// d1.
    pub d1: f64,
    /// d2.
    pub d2: f64,
    sqrt_t: f64,
    /// `exp((b - r) t)`.
    carry_discount: f64,
    /// `exp(-r t)`.
    discount: f64,
    pdf_d1: f64,
}

impl ModelTerms {
    /// True when every intermediate is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.d1.is_finite()
            && self.d2.is_finite()
            && self.carry_discount.is_finite()
            && self.discount.is_finite()
    }

    /// Theoretical price.
    #[must_use]
    pub fn price(&self, option_type: OptionType) -> f64 {
        match option_type {
            OptionType::Call => {
                self.s * self.carry_discount * norm_cdf(self.d1)
                    - self.k * self.discount * norm_cdf(self.d2)
            }
            OptionType::Put => {
                self.k * self.discount * norm_cdf(-self.d2)
                    - self.s * self.carry_discount * norm_cdf(-self.d1)
            }
        }
    }

    /// Delta.
    #[must_use]
    pub fn delta(&self, option_type: OptionType) -> f64 {
        match option_type {
            OptionType::Call => self.carry_discount * norm_cdf(self.d1),
            OptionType::Put => self.carry_discount * (norm_cdf(self.d1) - 1.0),
        }
    }

    /// Gamma (same for calls and puts).
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.carry_discount * self.pdf_d1 / (self.s * self.sigma * self.sqrt_t)
    }

    /// Vega (same for calls and puts).
    #[must_use]
    pub fn vega(&self) -> f64 {
        self.s * self.carry_discount * self.pdf_d1 * self.sqrt_t
    }

    /// Theta per year.
    #[must_use]
    pub fn theta(&self, option_type: OptionType) -> f64 {
        let decay = -self.s * self.carry_discount * self.pdf_d1 * self.sigma / (2.0 * self.sqrt_t);
        let forward = self.s * self.carry_discount;
        match option_type {
            OptionType::Call => {
                decay
                    - self.carry_minus_rate * forward * norm_cdf(self.d1)
                    - self.r * self.k * self.discount * norm_cdf(self.d2)
            }
            OptionType::Put => {
                decay
                    + self.carry_minus_rate * forward * norm_cdf(-self.d1)
                    + self.r * self.k * self.discount * norm_cdf(-self.d2)
            }
        }
    }

    /// Rho per unit rate.
    #[must_use]
    pub fn rho(&self, option_type: OptionType) -> f64 {
        match self.kind {
            // Futures options: rate only enters through discounting.
            ModelKind::Black76 => -self.t * self.price(option_type),
            ModelKind::BlackScholes => match option_type {
                OptionType::Call => self.t * self.k * self.discount * norm_cdf(self.d2),
                OptionType::Put => -self.t * self.k * self.discount * norm_cdf(-self.d2),
            },
        }
    }

    /// Raw value of one Greek.
    #[must_use]
    pub fn greek(&self, name: GreekName, option_type: OptionType) -> f64 {
        match name {
            GreekName::Delta => self.delta(option_type),
            GreekName::Gamma => self.gamma(),
            GreekName::Theta => self.theta(option_type),
            GreekName::Vega => self.vega(),
            GreekName::Rho => self.rho(option_type),
        }
    }
}

/// The active pricing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingModel {
    kind: ModelKind,
}

impl PricingModel {
    /// Model of the given kind.
    #[must_use]
    pub const fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    /// Resolve a configured model name.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedModelError` for unknown names; callers construct
    /// the model at startup so this never surfaces mid-stream.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedModelError> {
        name.parse().map(Self::new)
    }

    /// Model kind.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Canonical model name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Cost of carry for rate `r`.
    #[must_use]
    pub const fn carry(&self, r: f64) -> f64 {
        match self.kind {
            ModelKind::BlackScholes => r,
            ModelKind::Black76 => 0.0,
        }
    }

    /// Compute the shared intermediates for one option.
    #[must_use]
    pub fn terms(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64) -> ModelTerms {
        let b = self.carry(r);
        let sqrt_t = t.sqrt();
        let vol_sqrt_t = sigma * sqrt_t;
        let d1 = ((s / k).ln() + (b + 0.5 * sigma * sigma) * t) / vol_sqrt_t;
        let d2 = d1 - vol_sqrt_t;
        ModelTerms {
            kind: self.kind,
            s,
            k,
            t,
            sigma,
            r,
            carry_minus_rate: b - r,
            d1,
            d2,
            sqrt_t,
            carry_discount: ((b - r) * t).exp(),
            discount: (-r * t).exp(),
            pdf_d1: norm_pdf(d1),
        }
    }

    /// Theoretical price.
    #[must_use]
    pub fn price(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64, ot: OptionType) -> f64 {
        self.terms(s, k, t, sigma, r).price(ot)
    }

    /// Delta.
    #[must_use]
    pub fn delta(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64, ot: OptionType) -> f64 {
        self.terms(s, k, t, sigma, r).delta(ot)
    }

    /// Gamma.
    #[must_use]
    pub fn gamma(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64) -> f64 {
        self.terms(s, k, t, sigma, r).gamma()
    }

    /// Theta per year.
    #[must_use]
    pub fn theta(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64, ot: OptionType) -> f64 {
        self.terms(s, k, t, sigma, r).theta(ot)
    }

    /// Vega per 1.0 of volatility.
    #[must_use]
    pub fn vega(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64) -> f64 {
        self.terms(s, k, t, sigma, r).vega()
    }

    /// Rho per 1.0 of rate.
    #[must_use]
    pub fn rho(&self, s: f64, k: f64, t: f64, sigma: f64, r: f64, ot: OptionType) -> f64 {
        self.terms(s, k, t, sigma, r).rho(ot)
    }

    /// Lower no-arbitrage bound of the price (discounted intrinsic value).
    #[must_use]
    pub fn intrinsic(&self, s: f64, k: f64, t: f64, r: f64, ot: OptionType) -> f64 {
        let forward = s * ((self.carry(r) - r) * t).exp();
        let strike = k * (-r * t).exp();
        match ot {
            OptionType::Call => (forward - strike).max(0.0),
            OptionType::Put => (strike - forward).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    const BS: PricingModel = PricingModel::new(ModelKind::BlackScholes);
    const B76: PricingModel = PricingModel::new(ModelKind::Black76);

    #[test]
    fn test_norm_cdf() {
        assert!(approx_eq(norm_cdf(0.0), 0.5, 1e-6));
        assert!(approx_eq(norm_cdf(1.96), 0.975, 0.001));
        assert!(approx_eq(norm_cdf(-1.96), 0.025, 0.001));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            PricingModel::from_name("Black-Scholes").unwrap().kind(),
            ModelKind::BlackScholes
        );
        assert_eq!(PricingModel::from_name("black76").unwrap().name(), "black76");
        let err = PricingModel::from_name("heston").unwrap_err();
        assert_eq!(err.name, "heston");
    }

    #[test]
    fn test_bs_call_atm() {
        // S=100, K=100, T=1, r=0.05, sigma=0.20 -> ~10.45
        let price = BS.price(100.0, 100.0, 1.0, 0.20, 0.05, OptionType::Call);
        assert!(approx_eq(price, 10.4506, 1e-3));
    }

    #[test]
    fn test_bs_put_atm() {
        let price = BS.price(100.0, 100.0, 1.0, 0.20, 0.05, OptionType::Put);
        assert!(approx_eq(price, 5.5735, 1e-3));
    }

    #[test]
    fn test_put_call_parity() {
        let (s, k, t, sigma, r) = (2510.0, 2500.0, 0.07, 0.22, 0.065);
        let call = BS.price(s, k, t, sigma, r, OptionType::Call);
        let put = BS.price(s, k, t, sigma, r, OptionType::Put);
        assert!(approx_eq(call - put, s - k * (-r * t).exp(), 1e-9));
    }

    #[test]
    fn test_bs_greeks_reference_values() {
        // Hull-style reference: S=100, K=100, T=1, r=0.05, sigma=0.2
        let terms = BS.terms(100.0, 100.0, 1.0, 0.20, 0.05);
        assert!(approx_eq(terms.delta(OptionType::Call), 0.6368, 1e-4));
        assert!(approx_eq(terms.delta(OptionType::Put), -0.3632, 1e-4));
        assert!(approx_eq(terms.gamma(), 0.018_76, 1e-5));
        assert!(approx_eq(terms.vega(), 37.524, 1e-3));
        assert!(approx_eq(terms.theta(OptionType::Call), -6.414, 1e-3));
        assert!(approx_eq(terms.rho(OptionType::Call), 53.232, 1e-3));
    }

    #[test]
    fn test_black76_discounted_delta() {
        let (f, k, t, sigma, r) = (100.0, 100.0, 0.5, 0.25, 0.05);
        let terms = B76.terms(f, k, t, sigma, r);
        let expected = (-r * t).exp() * norm_cdf(terms.d1);
        assert!(approx_eq(terms.delta(OptionType::Call), expected, 1e-12));
        // rho of a futures option is -T * price
        let price = terms.price(OptionType::Call);
        assert!(approx_eq(terms.rho(OptionType::Call), -t * price, 1e-12));
    }

    #[test]
    fn test_black76_theta_identity() {
        // theta = -F e^{-rT} n(d1) sigma / (2 sqrt T) + r * price
        let (f, k, t, sigma, r) = (105.0, 100.0, 0.25, 0.3, 0.04);
        let terms = B76.terms(f, k, t, sigma, r);
        for ot in [OptionType::Call, OptionType::Put] {
            let expected = -f * (-r * t).exp() * norm_pdf(terms.d1) * sigma / (2.0 * t.sqrt())
                + r * terms.price(ot);
            assert!(approx_eq(terms.theta(ot), expected, 1e-10));
        }
    }

    #[test]
    fn test_reported_units() {
        assert!(approx_eq(reported(GreekName::Theta, -36.5), -0.1, 1e-12));
        assert!(approx_eq(reported(GreekName::Vega, 37.5), 0.375, 1e-12));
        assert!(approx_eq(reported(GreekName::Delta, 0.5), 0.5, 1e-12));
    }

    #[test]
    fn test_intrinsic() {
        assert!(approx_eq(
            BS.intrinsic(120.0, 100.0, 0.0, 0.05, OptionType::Call),
            20.0,
            1e-12
        ));
        assert!(approx_eq(
            BS.intrinsic(120.0, 100.0, 1.0, 0.05, OptionType::Put),
            0.0,
            1e-12
        ));
    }
}
