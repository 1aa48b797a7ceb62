//! Option pricing math.
//!
//! This module provides:
//! - The pricing model adapter (price, delta, gamma, theta, vega, rho)
//! - Time-to-expiry annualization
//! - Implied volatility computation (Newton-Raphson with bisection fallback)
//!
//! # Example
//!
//! ```ignore
//! use greeks_engine::pricing::{IvSolver, IvSolverConfig, PricingModel};
//! use greeks_engine::models::OptionType;
//!
//! let model = PricingModel::from_name("black_scholes")?;
//! let price = model.price(100.0, 100.0, 0.5, 0.2, 0.065, OptionType::Call);
//!
//! let solver = IvSolver::new(IvSolverConfig::default(), model);
//! let iv = solver.solve(price, 100.0, 100.0, 0.5, 0.065, OptionType::Call)?;
//! ```

mod iv;
mod model;
mod time;

pub use iv::{IvError, IvMethod, IvSolution, IvSolver, IvSolverConfig};
pub use model::{
    ModelKind, ModelTerms, PricingModel, THETA_DAYS, UnsupportedModelError, norm_cdf, norm_pdf,
    reported,
};
pub use time::{DAYS_PER_YEAR, DEFAULT_EXPIRY_CUTOFF, MIN_TIME_TO_EXPIRY, time_to_expiry};
