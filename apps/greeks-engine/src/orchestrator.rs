//! Real-time orchestrator.
//!
//! Sequences one tick through the pipeline:
//!
//! ```text
//! parse → underlying → time-to-expiry → volatility → guarded engine → envelope → cache
//! ```
//!
//! Any stage failure aborts the tick with a typed [`GreeksError`]; an envelope
//! is only produced once every stage has succeeded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::config::{CacheConfig, Config, EngineConfig, PricingConfig};
use crate::engine::{EngineStats, GreeksGuard, OptionBatch, ScalarEngine, VectorizedEngine};
use crate::error::GreeksError;
use crate::models::{
    CalculationEnvelope, ComputationPath, EnvelopeMetadata, GreeksResult, OptionDescriptor,
    TickSnapshot, UnderlyingQuote, VolatilityQuote,
};
use crate::observability::record_tick_failure;
use crate::parser::parse_option_key;
use crate::pricing::{IvSolver, PricingModel, time_to_expiry};
use crate::resilience::{CircuitBreaker, CircuitBreakerSnapshot};
use crate::resolver::{IvInputs, ResolvedUnderlying, UnderlyingResolver, VolatilityResolver};
use crate::store::{QuoteStore, greeks_key, set_json};

/// Name of the breaker guarding the vectorized engine.
pub const VECTORIZED_BREAKER: &str = "vectorized";

/// A tick whose inputs have all been resolved.
#[derive(Debug)]
struct PreparedTick {
    descriptor: OptionDescriptor,
    underlying: ResolvedUnderlying,
    time_to_expiry: f64,
    volatility: VolatilityQuote,
}

/// Per-tick Greeks pipeline.
///
/// `Send + Sync`; share it behind an `Arc`. Store I/O is the only await point.
pub struct GreeksOrchestrator {
    model: PricingModel,
    pricing: PricingConfig,
    engine: EngineConfig,
    cache: CacheConfig,
    underlying: UnderlyingResolver,
    volatility: VolatilityResolver,
    guard: GreeksGuard,
    store: Arc<dyn QuoteStore>,
}

impl std::fmt::Debug for GreeksOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreeksOrchestrator")
            .field("model", &self.model.name())
            .field("environment", &self.guard.environment())
            .field("underlying", &self.underlying)
            .field("volatility", &self.volatility)
            .finish_non_exhaustive()
    }
}

impl GreeksOrchestrator {
    /// Build the pipeline from configuration.
    ///
    /// # Errors
    ///
    /// `UnsupportedModel` for an unknown model name, `Config` for an invalid
    /// environment mode.
    pub fn new(config: &Config, store: Arc<dyn QuoteStore>) -> Result<Self, GreeksError> {
        let model = PricingModel::from_name(&config.pricing.model)?;
        let environment = config.environment.environment()?;

        let solver = IvSolver::new(config.iv_solver.clone(), model);
        let underlying = UnderlyingResolver::new(Arc::clone(&store), config.resolver.clone());
        let volatility =
            VolatilityResolver::new(Arc::clone(&store), config.volatility.clone(), solver);

        let breaker = CircuitBreaker::new(
            VECTORIZED_BREAKER,
            config.circuit_breaker.to_resilience_config(),
        );
        let guard = GreeksGuard::new(
            VectorizedEngine::new(model, config.engine.parallel_threshold),
            ScalarEngine::new(model),
            breaker,
            environment,
        );

        tracing::info!(
            model = model.name(),
            environment = %environment,
            index_mode = config.volatility.index_mode,
            "Greeks orchestrator ready"
        );

        Ok(Self {
            model,
            pricing: config.pricing.clone(),
            engine: config.engine.clone(),
            cache: config.cache.clone(),
            underlying,
            volatility,
            guard,
            store,
        })
    }

    /// Active pricing model.
    #[must_use]
    pub const fn model(&self) -> PricingModel {
        self.model
    }

    /// Compute Greeks for one tick with the configured fallback flag.
    ///
    /// # Errors
    ///
    /// Any stage failure, as a typed `GreeksError`.
    pub async fn compute_greeks(
        &self,
        tick: &TickSnapshot,
    ) -> Result<CalculationEnvelope, GreeksError> {
        self.compute_greeks_with(tick, self.engine.allow_fallback).await
    }

    /// Compute Greeks for one tick with an explicit fallback flag.
    ///
    /// # Errors
    ///
    /// Any stage failure, as a typed `GreeksError`.
    pub async fn compute_greeks_with(
        &self,
        tick: &TickSnapshot,
        allow_fallback: bool,
    ) -> Result<CalculationEnvelope, GreeksError> {
        let result = self.compute_one(tick, allow_fallback).await;
        if let Err(e) = &result {
            fail(tick, e);
        }
        result
    }

    async fn compute_one(
        &self,
        tick: &TickSnapshot,
        allow_fallback: bool,
    ) -> Result<CalculationEnvelope, GreeksError> {
        let prepared = self.prepare(tick).await?;

        let mut batch = OptionBatch::new(self.pricing.risk_free_rate, self.pricing.greeks.clone());
        push(&mut batch, &prepared);
        let (mut output, path) = self.guard.execute(&batch, allow_fallback)?;

        let result = output
            .results
            .pop()
            .ok_or_else(|| GreeksError::GreeksCalculation {
                cause: "engine returned no rows".to_string(),
                fallback_attempted: path == ComputationPath::Fallback,
            })?;
        let envelope = self.assemble(tick, prepared, result, path);
        self.cache_envelope(&envelope).await?;
        Ok(envelope)
    }

    /// Compute Greeks for many ticks in one guarded batch.
    ///
    /// Each tick is resolved independently; ticks that resolve go through the
    /// engine together. Results are returned in input order.
    pub async fn compute_greeks_batch(
        &self,
        ticks: &[TickSnapshot],
    ) -> Vec<Result<CalculationEnvelope, GreeksError>> {
        let mut slots: Vec<Option<Result<CalculationEnvelope, GreeksError>>> =
            Vec::with_capacity(ticks.len());
        let mut prepared = Vec::new();

        for (i, tick) in ticks.iter().enumerate() {
            match self.prepare(tick).await {
                Ok(p) => {
                    prepared.push((i, p));
                    slots.push(None);
                }
                Err(e) => slots.push(Some(Err(e))),
            }
        }

        if !prepared.is_empty() {
            let mut batch =
                OptionBatch::new(self.pricing.risk_free_rate, self.pricing.greeks.clone());
            for (_, p) in &prepared {
                push(&mut batch, p);
            }

            match self.guard.execute(&batch, self.engine.allow_fallback) {
                Ok((output, path)) => {
                    for ((i, p), result) in prepared.into_iter().zip(output.results) {
                        let envelope = self.assemble(&ticks[i], p, result, path);
                        let outcome = self.cache_envelope(&envelope).await.map(|()| envelope);
                        slots[i] = Some(outcome);
                    }
                }
                Err(e) => {
                    for (i, _) in prepared {
                        slots[i] = Some(Err(e.clone().into()));
                    }
                }
            }
        }

        slots
            .into_iter()
            .zip(ticks)
            .map(|(slot, tick)| {
                let result = slot.unwrap_or_else(|| {
                    Err(GreeksError::GreeksCalculation {
                        cause: "engine returned fewer rows than requested".to_string(),
                        fallback_attempted: false,
                    })
                });
                if let Err(e) = &result {
                    fail(tick, e);
                }
                result
            })
            .collect()
    }

    /// Feed an underlying quote into the recency cache. Returns false when
    /// the quote is older than the one already held.
    pub fn observe_underlying(&self, quote: UnderlyingQuote) -> bool {
        self.underlying.observe(quote)
    }

    /// Breaker guarding the vectorized engine.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        self.guard.breaker()
    }

    /// Breaker state and counters.
    #[must_use]
    pub fn breaker_snapshot(&self) -> CircuitBreakerSnapshot {
        self.guard.snapshot()
    }

    /// Cumulative vectorized engine counters.
    #[must_use]
    pub fn engine_stats(&self) -> EngineStats {
        self.guard.primary().stats()
    }

    async fn prepare(&self, tick: &TickSnapshot) -> Result<PreparedTick, GreeksError> {
        let descriptor = parse_option_key(&tick.instrument)
            .map_err(|e| GreeksError::parse(&tick.instrument, &e))?;

        let underlying = self
            .underlying
            .resolve(&descriptor.underlying(), tick.timestamp)
            .await?;

        let time_to_expiry = time_to_expiry(
            descriptor.expiry,
            tick.timestamp,
            self.pricing.expiry_cutoff_utc,
        );

        let inputs = IvInputs {
            // NaN is rejected by the solver as an unusable price
            market_price: tick.price.to_f64().unwrap_or(f64::NAN),
            spot: underlying.price,
            strike: descriptor.strike,
            time_to_expiry,
            rate: self.pricing.risk_free_rate,
            option_type: descriptor.option_type,
        };
        let volatility = self.volatility.resolve(&inputs, tick.timestamp).await?;

        tracing::debug!(
            instrument = %tick.instrument,
            spot = underlying.price,
            tier = underlying.tier.as_str(),
            time_to_expiry,
            volatility = volatility.value,
            source = %volatility.source,
            "Tick inputs resolved"
        );

        Ok(PreparedTick {
            descriptor,
            underlying,
            time_to_expiry,
            volatility,
        })
    }

    fn assemble(
        &self,
        tick: &TickSnapshot,
        prepared: PreparedTick,
        result: GreeksResult,
        path: ComputationPath,
    ) -> CalculationEnvelope {
        CalculationEnvelope {
            calculation_id: Uuid::new_v4(),
            instrument: tick.instrument.clone(),
            descriptor: prepared.descriptor,
            tick_timestamp: tick.timestamp,
            underlying_timestamp: prepared.underlying.quote.timestamp,
            computed_at: Utc::now(),
            option_price: tick.price,
            underlying_price: prepared.underlying.quote.price,
            volatility: prepared.volatility,
            time_to_expiry: prepared.time_to_expiry,
            result,
            metadata: EnvelopeMetadata {
                currency: tick.currency.clone(),
                timezone: tick.timezone.clone(),
                model: self.model.name().to_string(),
                path,
            },
        }
    }

    async fn cache_envelope(&self, envelope: &CalculationEnvelope) -> Result<(), GreeksError> {
        if !self.cache.enabled {
            return Ok(());
        }
        let ttl = Duration::from_secs(self.cache.envelope_ttl_secs);
        set_json(
            self.store.as_ref(),
            &greeks_key(&envelope.instrument),
            envelope,
            Some(ttl),
        )
        .await?;
        Ok(())
    }
}

fn push(batch: &mut OptionBatch, prepared: &PreparedTick) {
    batch.push(
        prepared.descriptor.clone(),
        prepared.underlying.price,
        prepared.time_to_expiry,
        prepared.volatility.value,
    );
}

fn fail(tick: &TickSnapshot, error: &GreeksError) {
    record_tick_failure(error.code());
    tracing::warn!(
        instrument = %tick.instrument,
        code = error.code(),
        error = %error,
        "Tick failed"
    );
}
