//! Engine execution and envelope caching configuration.

use serde::{Deserialize, Serialize};

use super::pricing::default_true;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Batch size from which rows are evaluated in parallel.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    /// Caller fallback flag used when none is given explicitly.
    #[serde(default = "default_true")]
    pub allow_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: default_parallel_threshold(),
            allow_fallback: true,
        }
    }
}

/// Envelope caching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Write envelopes to the store.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Envelope TTL (seconds).
    #[serde(default = "default_envelope_ttl_secs")]
    pub envelope_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            envelope_ttl_secs: default_envelope_ttl_secs(),
        }
    }
}

const fn default_parallel_threshold() -> usize {
    256
}

const fn default_envelope_ttl_secs() -> u64 {
    300
}
