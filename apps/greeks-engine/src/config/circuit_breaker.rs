//! Circuit breaker configuration for the vectorized path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Duration in open state (seconds).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Probe calls permitted in half-open state.
    #[serde(default = "default_half_open_probes")]
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown(),
            half_open_probes: default_half_open_probes(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Convert config settings to resilience module's `CircuitBreakerConfig`.
    #[must_use]
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            half_open_probes: self.half_open_probes.max(1),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown() -> u64 {
    30
}

const fn default_half_open_probes() -> u32 {
    1
}
