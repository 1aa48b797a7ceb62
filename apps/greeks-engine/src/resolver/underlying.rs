//! Underlying price resolver.
//!
//! Three tiers, each with its own staleness window measured against the
//! tick's timestamp (in either direction, since quotes may arrive late):
//!
//! 1. In-process recency cache, window A (`cache_max_age_ms`)
//! 2. External store latest quote, window B (`store_max_age_ms`)
//! 3. Last-known-good scan of the store's history list, window B
//!
//! A quote exactly at the window limit is accepted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::ResolveError;
use crate::config::ResolverConfig;
use crate::models::UnderlyingQuote;
use crate::observability::{record_quote_staleness, record_underlying_resolution};
use crate::store::{QuoteStore, decode, get_json, underlying_history_key, underlying_key};

/// Where a resolved quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Recency cache.
    Cache,
    /// Store latest-quote key.
    Store,
    /// Store history list.
    LastKnownGood,
}

impl ResolutionTier {
    /// Metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
            Self::LastKnownGood => "last_known_good",
        }
    }
}

/// A quote accepted for a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUnderlying {
    /// The quote.
    pub quote: UnderlyingQuote,
    /// Its price as `f64`.
    pub price: f64,
    /// Tier that supplied it.
    pub tier: ResolutionTier,
    /// Distance from the tick.
    pub age_ms: u64,
}

/// Reconciles option ticks with the freshest known underlying price.
pub struct UnderlyingResolver {
    store: Arc<dyn QuoteStore>,
    cache: DashMap<String, UnderlyingQuote>,
    config: ResolverConfig,
}

impl std::fmt::Debug for UnderlyingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnderlyingResolver")
            .field("cached_symbols", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UnderlyingResolver {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn QuoteStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            cache: DashMap::with_capacity(config.cache_capacity.min(1024)),
            config,
        }
    }

    /// Offer a quote to the recency cache.
    ///
    /// Returns `false` when an entry with a newer timestamp is already cached.
    /// When the cache is full, a new symbol evicts the entry with the oldest
    /// timestamp.
    pub fn observe(&self, quote: UnderlyingQuote) -> bool {
        if !self.cache.contains_key(&quote.symbol)
            && self.cache.len() >= self.config.cache_capacity
        {
            self.evict_oldest();
        }

        match self.cache.entry(quote.symbol.clone()) {
            Entry::Occupied(mut entry) => {
                if quote.timestamp < entry.get().timestamp {
                    tracing::debug!(
                        symbol = %quote.symbol,
                        stale = %quote.timestamp,
                        cached = %entry.get().timestamp,
                        "Ignoring out-of-order underlying quote"
                    );
                    return false;
                }
                entry.insert(quote);
            }
            Entry::Vacant(entry) => {
                entry.insert(quote);
            }
        }
        true
    }

    fn evict_oldest(&self) {
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.value().timestamp)
            .map(|entry| entry.key().clone());
        if let Some(symbol) = oldest {
            self.cache.remove(&symbol);
        }
    }

    /// Cached quote for `symbol`, regardless of age.
    #[must_use]
    pub fn cached(&self, symbol: &str) -> Option<UnderlyingQuote> {
        self.cache.get(symbol).map(|entry| entry.value().clone())
    }

    /// Symbols currently cached.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve the underlying price for a tick observed at `at`.
    ///
    /// # Errors
    ///
    /// `UnderlyingUnavailable` when no tier holds a quote inside its window,
    /// `Store` when the store fails.
    pub async fn resolve(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
    ) -> Result<ResolvedUnderlying, ResolveError> {
        let mut closest: Option<u64> = None;

        if let Some(quote) = self.cached(symbol) {
            match accept(quote, at, self.config.cache_max_age_ms, ResolutionTier::Cache) {
                Ok(resolved) => return Ok(self.finish(resolved)),
                Err(age) => closest = min_age(closest, age),
            }
        }

        let stored: Option<UnderlyingQuote> =
            get_json(self.store.as_ref(), &underlying_key(symbol)).await?;
        if let Some(quote) = stored {
            match accept(quote, at, self.config.store_max_age_ms, ResolutionTier::Store) {
                Ok(resolved) => {
                    self.observe(resolved.quote.clone());
                    return Ok(self.finish(resolved));
                }
                Err(age) => closest = min_age(closest, age),
            }
        }

        if let Some(resolved) = self.scan_last_known_good(symbol, at, &mut closest).await? {
            return Ok(self.finish(resolved));
        }

        record_underlying_resolution("unavailable");
        let reason = closest.map_or_else(
            || "no quote in cache, store or history".to_string(),
            |age| {
                format!(
                    "closest quote is {age}ms from the tick (windows: cache {}ms, store {}ms)",
                    self.config.cache_max_age_ms, self.config.store_max_age_ms
                )
            },
        );
        Err(ResolveError::UnderlyingUnavailable {
            symbol: symbol.to_string(),
            reason,
        })
    }

    /// Closest usable history entry inside window B.
    async fn scan_last_known_good(
        &self,
        symbol: &str,
        at: DateTime<Utc>,
        closest: &mut Option<u64>,
    ) -> Result<Option<ResolvedUnderlying>, ResolveError> {
        let depth = self.config.last_known_good_depth;
        if depth == 0 {
            return Ok(None);
        }
        let key = underlying_history_key(symbol);
        let end = isize::try_from(depth - 1).unwrap_or(isize::MAX);
        let history = self.store.list_range(&key, 0, end).await?;

        let mut best: Option<ResolvedUnderlying> = None;
        for raw in history {
            let quote: UnderlyingQuote = decode(&key, &raw)?;
            match accept(quote, at, self.config.store_max_age_ms, ResolutionTier::LastKnownGood) {
                Ok(resolved) => {
                    if best.as_ref().is_none_or(|b| resolved.age_ms < b.age_ms) {
                        best = Some(resolved);
                    }
                }
                Err(age) => *closest = min_age(*closest, age),
            }
        }
        Ok(best)
    }

    fn finish(&self, resolved: ResolvedUnderlying) -> ResolvedUnderlying {
        record_underlying_resolution(resolved.tier.as_str());
        record_quote_staleness(&resolved.quote.symbol, resolved.age_ms as f64 / 1000.0);
        tracing::debug!(
            symbol = %resolved.quote.symbol,
            tier = resolved.tier.as_str(),
            age_ms = resolved.age_ms,
            "Resolved underlying price"
        );
        resolved
    }
}

/// Accept `quote` if it is within `window_ms` of `at` and priced; otherwise
/// return its age for diagnostics.
fn accept(
    quote: UnderlyingQuote,
    at: DateTime<Utc>,
    window_ms: u64,
    tier: ResolutionTier,
) -> Result<ResolvedUnderlying, u64> {
    let age_ms = quote.age_ms(at).unsigned_abs();
    match quote.price_f64() {
        Some(price) if quote.is_within_ms(at, window_ms) => Ok(ResolvedUnderlying {
            quote,
            price,
            tier,
            age_ms,
        }),
        _ => Err(age_ms),
    }
}

fn min_age(current: Option<u64>, age: u64) -> Option<u64> {
    Some(current.map_or(age, |c| c.min(age)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryQuoteStore, MockQuoteStore, StoreError, set_json};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    const SYMBOL: &str = "NSE@RELIANCE@OPT";

    fn tick_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 25, 6, 0, 0).unwrap()
    }

    fn quote_at(offset_ms: i64) -> UnderlyingQuote {
        UnderlyingQuote::new(SYMBOL, dec!(2512.5), tick_time() + Duration::milliseconds(offset_ms))
    }

    fn resolver(store: Arc<dyn QuoteStore>) -> UnderlyingResolver {
        UnderlyingResolver::new(store, ResolverConfig::default())
    }

    #[tokio::test]
    async fn test_cache_hit_within_window() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        r.observe(quote_at(-1500));
        let resolved = r.resolve(SYMBOL, tick_time()).await.unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Cache);
        assert!((resolved.price - 2512.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cache_boundary_exact_limit_accepted() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        r.observe(quote_at(-2000));
        let resolved = r.resolve(SYMBOL, tick_time()).await.unwrap();
        assert_eq!(resolved.age_ms, 2000);
    }

    #[tokio::test]
    async fn test_cache_fraction_of_ms_past_limit_rejected() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        r.observe(UnderlyingQuote::new(
            SYMBOL,
            dec!(2512.5),
            tick_time() - Duration::microseconds(2_000_900),
        ));
        let err = r.resolve(SYMBOL, tick_time()).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnderlyingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_late_quote_counts_by_distance() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        r.observe(quote_at(800));
        assert_eq!(r.resolve(SYMBOL, tick_time()).await.unwrap().age_ms, 800);
    }

    #[tokio::test]
    async fn test_store_tier_boundary() {
        let store = Arc::new(InMemoryQuoteStore::new());
        set_json(store.as_ref(), &underlying_key(SYMBOL), &quote_at(-10_000), None)
            .await
            .unwrap();
        let r = resolver(store.clone());
        let resolved = r.resolve(SYMBOL, tick_time()).await.unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Store);
        // Store hits warm the cache
        assert!(r.cached(SYMBOL).is_some());

        set_json(store.as_ref(), &underlying_key(SYMBOL), &quote_at(-10_001), None)
            .await
            .unwrap();
        let r = resolver(store);
        let err = r.resolve(SYMBOL, tick_time()).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnderlyingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_stale_cache_falls_through_to_store() {
        let store = Arc::new(InMemoryQuoteStore::new());
        set_json(store.as_ref(), &underlying_key(SYMBOL), &quote_at(-5_000), None)
            .await
            .unwrap();
        let r = resolver(store);
        r.observe(quote_at(-9_000));
        let resolved = r.resolve(SYMBOL, tick_time()).await.unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Store);
        assert_eq!(resolved.age_ms, 5_000);
    }

    #[tokio::test]
    async fn test_last_known_good_picks_closest() {
        let store = Arc::new(InMemoryQuoteStore::new());
        let key = underlying_history_key(SYMBOL);
        for offset in [-30_000, -9_000, -4_000, 3_000] {
            let raw = serde_json::to_string(&quote_at(offset)).unwrap();
            store.push_front(&key, raw, 50).await;
        }
        let resolved = resolver(store).resolve(SYMBOL, tick_time()).await.unwrap();
        assert_eq!(resolved.tier, ResolutionTier::LastKnownGood);
        assert_eq!(resolved.age_ms, 3_000);
    }

    #[tokio::test]
    async fn test_nothing_fresh_is_unavailable() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        r.observe(quote_at(-60_000));
        let err = r.resolve(SYMBOL, tick_time()).await.unwrap_err();
        let ResolveError::UnderlyingUnavailable { symbol, reason } = err else {
            panic!("expected UnderlyingUnavailable");
        };
        assert_eq!(symbol, SYMBOL);
        assert!(reason.contains("60000ms"));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockQuoteStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Backend("connection reset".to_string())));
        let err = resolver(Arc::new(store))
            .resolve(SYMBOL, tick_time())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn test_out_of_order_quote_ignored() {
        let r = resolver(Arc::new(InMemoryQuoteStore::new()));
        assert!(r.observe(quote_at(0)));
        assert!(!r.observe(quote_at(-100)));
        assert_eq!(r.cached(SYMBOL).unwrap().timestamp, tick_time());
        assert!(r.observe(quote_at(100)));
    }

    #[test]
    fn test_full_cache_evicts_oldest() {
        let config = ResolverConfig {
            cache_capacity: 2,
            ..ResolverConfig::default()
        };
        let r = UnderlyingResolver::new(Arc::new(InMemoryQuoteStore::new()), config);
        let at = tick_time();
        r.observe(UnderlyingQuote::new("A", dec!(1), at));
        r.observe(UnderlyingQuote::new("B", dec!(1), at + Duration::seconds(1)));
        r.observe(UnderlyingQuote::new("C", dec!(1), at + Duration::seconds(2)));
        assert_eq!(r.cache_len(), 2);
        assert!(r.cached("A").is_none());
        assert!(r.cached("C").is_some());
    }
}
