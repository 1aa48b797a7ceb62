//! Volatility resolver.
//!
//! In index mode the index-wide volatility is used when present, usable and
//! younger than `index_max_age_secs`; otherwise, and always outside index
//! mode, volatility is implied from the option's own price.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ResolveError;
use crate::config::VolatilityConfig;
use crate::models::{OptionType, VolatilityQuote};
use crate::pricing::IvSolver;
use crate::store::{QuoteStore, get_json, index_volatility_key};

/// Inputs for implying volatility from an option price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvInputs {
    /// Observed option price.
    pub market_price: f64,
    /// Underlying price.
    pub spot: f64,
    /// Strike.
    pub strike: f64,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
    /// Risk-free rate.
    pub rate: f64,
    /// Call or put.
    pub option_type: OptionType,
}

/// Chooses between index volatility and implied volatility.
pub struct VolatilityResolver {
    store: Arc<dyn QuoteStore>,
    config: VolatilityConfig,
    solver: IvSolver,
}

impl std::fmt::Debug for VolatilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolatilityResolver")
            .field("config", &self.config)
            .field("solver", &self.solver)
            .finish_non_exhaustive()
    }
}

impl VolatilityResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(store: Arc<dyn QuoteStore>, config: VolatilityConfig, solver: IvSolver) -> Self {
        Self {
            store,
            config,
            solver,
        }
    }

    /// True when the index volatility is preferred.
    #[must_use]
    pub const fn index_mode(&self) -> bool {
        self.config.index_mode
    }

    /// Resolve the volatility for a tick observed at `at`.
    ///
    /// # Errors
    ///
    /// `VolatilityNotFound` when the solver fails, `Store` when the store
    /// fails while reading the index.
    pub async fn resolve(
        &self,
        inputs: &IvInputs,
        at: DateTime<Utc>,
    ) -> Result<VolatilityQuote, ResolveError> {
        if self.config.index_mode {
            if let Some(quote) = self.index_volatility(at).await? {
                return Ok(quote);
            }
        }
        self.implied(inputs, at)
    }

    /// Fresh, usable index volatility, if any.
    async fn index_volatility(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Option<VolatilityQuote>, ResolveError> {
        let key = index_volatility_key(&self.config.index_symbol);
        let Some(quote) = get_json::<VolatilityQuote>(self.store.as_ref(), &key).await? else {
            tracing::debug!(
                index = %self.config.index_symbol,
                "No index volatility, implying from price"
            );
            return Ok(None);
        };

        let quote = quote.normalized();
        let age_secs = (at - quote.timestamp).num_seconds().unsigned_abs();
        if !quote.is_usable() || !quote.is_within_secs(at, self.config.index_max_age_secs) {
            tracing::debug!(
                index = %self.config.index_symbol,
                value = quote.value,
                age_secs,
                "Index volatility unusable, implying from price"
            );
            return Ok(None);
        }
        Ok(Some(quote))
    }

    fn implied(
        &self,
        inputs: &IvInputs,
        at: DateTime<Utc>,
    ) -> Result<VolatilityQuote, ResolveError> {
        let solution = self
            .solver
            .solve(
                inputs.market_price,
                inputs.spot,
                inputs.strike,
                inputs.time_to_expiry,
                inputs.rate,
                inputs.option_type,
            )
            .map_err(|e| ResolveError::VolatilityNotFound {
                reason: e.to_string(),
            })?;

        tracing::debug!(
            sigma = solution.sigma,
            iterations = solution.iterations,
            method = ?solution.method,
            "Implied volatility solved"
        );
        Ok(VolatilityQuote::implied(solution.sigma, at))
    }
}
