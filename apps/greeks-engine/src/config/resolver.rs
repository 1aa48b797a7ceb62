//! Underlying and volatility resolution windows.

use serde::{Deserialize, Serialize};

/// Underlying price resolver configuration.
///
/// Two windows are kept apart on purpose: the in-process cache is trusted for
/// a shorter time than the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Max age of a recency-cache quote, relative to the tick (window A).
    #[serde(default = "default_cache_max_age_ms")]
    pub cache_max_age_ms: u64,
    /// Max age of a store or last-known-good quote (window B).
    #[serde(default = "default_store_max_age_ms")]
    pub store_max_age_ms: u64,
    /// History entries scanned for a last-known-good quote.
    #[serde(default = "default_last_known_good_depth")]
    pub last_known_good_depth: usize,
    /// Symbols kept in the recency cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_max_age_ms: default_cache_max_age_ms(),
            store_max_age_ms: default_store_max_age_ms(),
            last_known_good_depth: default_last_known_good_depth(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Volatility resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Prefer the index-wide volatility over per-option IV.
    #[serde(default)]
    pub index_mode: bool,
    /// Index whose volatility is used.
    #[serde(default = "default_index_symbol")]
    pub index_symbol: String,
    /// Max age of the index volatility (seconds).
    #[serde(default = "default_index_max_age_secs")]
    pub index_max_age_secs: u64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            index_mode: false,
            index_symbol: default_index_symbol(),
            index_max_age_secs: default_index_max_age_secs(),
        }
    }
}

const fn default_cache_max_age_ms() -> u64 {
    2_000
}

const fn default_store_max_age_ms() -> u64 {
    10_000
}

const fn default_last_known_good_depth() -> usize {
    50
}

const fn default_cache_capacity() -> usize {
    4_096
}

fn default_index_symbol() -> String {
    "INDIAVIX".to_string()
}

const fn default_index_max_age_secs() -> u64 {
    300
}
