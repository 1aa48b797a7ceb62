//! Implied Volatility Solver
//!
//! Inverts the active pricing model for volatility:
//! - Newton-Raphson seeded by a Corrado-Miller guess for near-the-money options
//! - Bisection over the bracket `[min_vol, max_vol]` for far-from-the-money
//!   options and whenever Newton-Raphson stalls
//!
//! Both stop at a fixed iteration cap. Prices outside the range reachable
//! inside the bracket have no solution.

// Black-Scholes uses standard mathematical notation (s, k, t, r, sigma)
// Financial formulas use standard notation where mul_add() obscures meaning
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::PricingModel;
use crate::models::OptionType;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from IV computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IvError {
    /// Convergence failed after max iterations.
    #[error(
        "IV solver failed to converge after {iterations} iterations (last error: {last_error:.6})"
    )]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: u32,
        /// Last price error.
        last_error: f64,
    },

    /// Invalid input parameters.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },

    /// No solution exists inside the volatility bracket.
    #[error("No valid IV solution: {reason}")]
    NoSolution {
        /// Reason no solution exists.
        reason: String,
    },
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for IV solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSolverConfig {
    /// Maximum iterations for each method.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Convergence tolerance (absolute price error).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Lower volatility bound (e.g., 0.001 = 0.1%).
    #[serde(default = "default_min_vol")]
    pub min_vol: f64,
    /// Upper volatility bound (e.g., 5.0 = 500%).
    #[serde(default = "default_max_vol")]
    pub max_vol: f64,
    /// Switch to bisection when |ln(S/K)| exceeds this (e.g., 0.20 = 20%).
    #[serde(default = "default_hybrid_threshold")]
    pub hybrid_threshold: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            min_vol: default_min_vol(),
            max_vol: default_max_vol(),
            hybrid_threshold: default_hybrid_threshold(),
        }
    }
}

const fn default_max_iterations() -> u32 {
    100
}

const fn default_tolerance() -> f64 {
    1e-8
}

const fn default_min_vol() -> f64 {
    0.001
}

const fn default_max_vol() -> f64 {
    5.0
}

const fn default_hybrid_threshold() -> f64 {
    0.20
}

/// Method that produced a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvMethod {
    /// Newton-Raphson.
    NewtonRaphson,
    /// Bracketed bisection.
    Bisection,
}

/// A converged implied volatility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvSolution {
    /// Implied volatility as a decimal.
    pub sigma: f64,
    /// Iterations used by the method that converged.
    pub iterations: u32,
    /// Method that converged.
    pub method: IvMethod,
}

// ============================================================================
// IV Solvers
// ============================================================================

/// Implied Volatility Solver bound to one pricing model.
#[derive(Debug, Clone)]
pub struct IvSolver {
    config: IvSolverConfig,
    model: PricingModel,
}

impl IvSolver {
    /// Create a new IV solver with the given configuration and model.
    #[must_use]
    pub const fn new(config: IvSolverConfig, model: PricingModel) -> Self {
        Self { config, model }
    }

    /// Solver configuration.
    #[must_use]
    pub const fn config(&self) -> &IvSolverConfig {
        &self.config
    }

    /// Compute implied volatility using the hybrid approach.
    ///
    /// # Arguments
    ///
    /// * `market_price` - Observed option price
    /// * `s` - Underlying price
    /// * `k` - Strike price
    /// * `t` - Time to expiration (years)
    /// * `r` - Risk-free rate (annualized)
    /// * `kind` - Call or put
    ///
    /// # Errors
    ///
    /// Returns an error if inputs are invalid, the price is unreachable inside
    /// the volatility bracket, or the iteration budget is exhausted.
    pub fn solve(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        kind: OptionType,
    ) -> Result<IvSolution, IvError> {
        Self::validate_inputs(market_price, s, k, t)?;

        let intrinsic = self.model.intrinsic(s, k, t, r, kind);
        if market_price < intrinsic - self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) is below intrinsic value ({intrinsic:.4})"
                ),
            });
        }

        let moneyness = (s / k).ln().abs();

        if moneyness > self.config.hybrid_threshold {
            // Far from money - vega is small, bisection is the robust choice
            self.bisection(market_price, s, k, t, r, kind)
        } else {
            let initial_guess = self.corrado_miller_guess(market_price, s, k, t, r, kind);
            self.newton_raphson(market_price, s, k, t, r, kind, initial_guess)
                .or_else(|_| self.bisection(market_price, s, k, t, r, kind))
        }
    }

    fn validate_inputs(market_price: f64, s: f64, k: f64, t: f64) -> Result<(), IvError> {
        let checks = [
            ("Market price", market_price),
            ("Underlying price", s),
            ("Strike price", k),
            ("Time to expiration", t),
        ];
        for (label, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(IvError::InvalidInput {
                    message: format!("{label} must be positive, got: {value}"),
                });
            }
        }
        Ok(())
    }

    /// Modified Corrado-Miller initial guess for Newton-Raphson.
    fn corrado_miller_guess(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        kind: OptionType,
    ) -> f64 {
        let f = s * (self.model.carry(r) * t).exp();
        let df = (-r * t).exp();

        // Convert to call price if put (put-call parity)
        let call_price = match kind {
            OptionType::Call => market_price,
            OptionType::Put => market_price + df * (f - k),
        };

        let x = f - k;
        let y = call_price / df;

        if y <= 0.0 {
            return 0.30;
        }

        let numerator = y - 0.5 * x;
        let sqrt_term = (y - 0.5 * x).powi(2) - (x.powi(2) / PI);

        if sqrt_term < 0.0 {
            return 0.30;
        }

        let sigma_approx = (PI / (2.0 * t)).sqrt() * (numerator + sqrt_term.sqrt()) / f;

        if sigma_approx.is_finite() {
            sigma_approx.clamp(self.config.min_vol, self.config.max_vol)
        } else {
            0.30
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn newton_raphson(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        kind: OptionType,
        initial_guess: f64,
    ) -> Result<IvSolution, IvError> {
        let mut sigma = initial_guess.clamp(self.config.min_vol, self.config.max_vol);

        for i in 0..self.config.max_iterations {
            let terms = self.model.terms(s, k, t, sigma, r);
            let error = terms.price(kind) - market_price;

            if error.abs() < self.config.tolerance {
                return Ok(IvSolution {
                    sigma,
                    iterations: i + 1,
                    method: IvMethod::NewtonRaphson,
                });
            }

            let vega = terms.vega();

            // Vega too small, let bisection take over
            if !vega.is_finite() || vega.abs() < 1e-12 {
                return Err(IvError::ConvergenceFailed {
                    iterations: i,
                    last_error: error.abs(),
                });
            }

            sigma = (sigma - error / vega).clamp(self.config.min_vol, self.config.max_vol);
        }

        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error: (self.model.price(s, k, t, sigma, r, kind) - market_price).abs(),
        })
    }

    fn bisection(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        kind: OptionType,
    ) -> Result<IvSolution, IvError> {
        let mut low = self.config.min_vol;
        let mut high = self.config.max_vol;

        // Verify solution exists in range
        let price_low = self.model.price(s, k, t, low, r, kind);
        let price_high = self.model.price(s, k, t, high, r, kind);

        if market_price < price_low - self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) is below minimum theoretical price ({price_low:.4})"
                ),
            });
        }
        if market_price > price_high + self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) exceeds maximum theoretical price ({price_high:.4})"
                ),
            });
        }

        for i in 0..self.config.max_iterations {
            let mid = low.midpoint(high);
            let error = self.model.price(s, k, t, mid, r, kind) - market_price;

            if error.abs() < self.config.tolerance || (high - low) < 1e-10 {
                return Ok(IvSolution {
                    sigma: mid,
                    iterations: i + 1,
                    method: IvMethod::Bisection,
                });
            }

            if error > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }

        let mid = low.midpoint(high);
        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error: (self.model.price(s, k, t, mid, r, kind) - market_price).abs(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::model::ModelKind;
    use proptest::prelude::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    fn bs_solver() -> IvSolver {
        IvSolver::new(
            IvSolverConfig::default(),
            PricingModel::new(ModelKind::BlackScholes),
        )
    }

    fn round_trip(solver: &IvSolver, s: f64, k: f64, t: f64, r: f64, sigma: f64, kind: OptionType) -> f64 {
        let model = PricingModel::new(ModelKind::BlackScholes);
        let market_price = model.price(s, k, t, sigma, r, kind);
        match solver.solve(market_price, s, k, t, r, kind) {
            Ok(solution) => solution.sigma,
            Err(e) => panic!("IV solver should converge: {e}"),
        }
    }

    #[test]
    fn test_iv_solver_atm_call() {
        let iv = round_trip(&bs_solver(), 100.0, 100.0, 1.0, 0.05, 0.25, OptionType::Call);
        assert!(approx_eq(iv, 0.25, 1e-4));
    }

    #[test]
    fn test_iv_solver_atm_put() {
        let iv = round_trip(&bs_solver(), 100.0, 100.0, 0.5, 0.03, 0.30, OptionType::Put);
        assert!(approx_eq(iv, 0.30, 1e-4));
    }

    #[test]
    fn test_iv_solver_otm_call_uses_bisection() {
        let solver = bs_solver();
        let model = PricingModel::new(ModelKind::BlackScholes);
        let price = model.price(100.0, 130.0, 0.25, 0.35, 0.05, OptionType::Call);
        let solution = solver
            .solve(price, 100.0, 130.0, 0.25, 0.05, OptionType::Call)
            .unwrap();
        assert_eq!(solution.method, IvMethod::Bisection);
        assert!(approx_eq(solution.sigma, 0.35, 1e-3));
    }

    #[test]
    fn test_iv_solver_black76() {
        let model = PricingModel::new(ModelKind::Black76);
        let solver = IvSolver::new(IvSolverConfig::default(), model);
        let price = model.price(23_500.0, 23_400.0, 14.0 / 365.0, 0.14, 0.065, OptionType::Put);
        let solution = solver
            .solve(price, 23_500.0, 23_400.0, 14.0 / 365.0, 0.065, OptionType::Put)
            .unwrap();
        assert!(approx_eq(solution.sigma, 0.14, 1e-4));
    }

    #[test]
    fn test_iv_solver_invalid_price() {
        let result = bs_solver().solve(-1.0, 100.0, 100.0, 1.0, 0.05, OptionType::Call);
        assert!(matches!(result, Err(IvError::InvalidInput { .. })));
    }

    #[test]
    fn test_iv_solver_below_intrinsic() {
        // Intrinsic ~ 22.4, price of 15 is impossible
        let result = bs_solver().solve(15.0, 120.0, 100.0, 0.5, 0.05, OptionType::Call);
        assert!(matches!(result, Err(IvError::NoSolution { .. })));
    }

    #[test]
    fn test_iv_solver_price_above_bracket() {
        // A call can never be worth more than the underlying
        let result = bs_solver().solve(99.0, 100.0, 100.0, 0.1, 0.05, OptionType::Call);
        assert!(matches!(result, Err(IvError::NoSolution { .. })));
    }

    #[test]
    fn test_corrado_miller_guess() {
        let solver = bs_solver();
        let model = PricingModel::new(ModelKind::BlackScholes);
        let price = model.price(100.0, 100.0, 1.0, 0.25, 0.05, OptionType::Call);
        let guess = solver.corrado_miller_guess(price, 100.0, 100.0, 1.0, 0.05, OptionType::Call);
        assert!(approx_eq(guess, 0.25, 0.10));
    }

    #[test]
    fn test_iv_solver_high_iv() {
        let iv = round_trip(&bs_solver(), 50.0, 50.0, 0.1, 0.05, 1.50, OptionType::Call);
        assert!(approx_eq(iv, 1.50, 1e-4));
    }

    proptest! {
        #[test]
        fn prop_round_trip_recovers_sigma(
            sigma in 0.05f64..2.0,
            strike in 95.0f64..105.0,
            t in 0.25f64..2.0,
            is_call in any::<bool>(),
        ) {
            let kind = if is_call { OptionType::Call } else { OptionType::Put };
            let recovered = round_trip(&bs_solver(), 100.0, strike, t, 0.05, sigma, kind);
            prop_assert!((recovered - sigma).abs() < 1e-4, "sigma={sigma} recovered={recovered}");
        }
    }
}
