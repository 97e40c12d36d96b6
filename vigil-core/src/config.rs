//! Scope Configuration
//!
//! Tunables for a scope. Everything has a default, so an empty document
//! deserializes to the stock configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// Default convergence ceiling.
pub const DEFAULT_DIGEST_TTL: usize = 10;

/// Configuration for a [`Scope`](crate::scope::Scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Maximum number of dirty passes a single digest may run.
    pub digest_ttl: usize,

    /// Delay handed to the scheduler for the `eval_async` wake-up and the
    /// `apply_async` flush.
    pub defer_delay_ms: u64,
}

impl ScopeConfig {
    /// Check the configuration for values the digest loop cannot work with.
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.digest_ttl == 0 {
            return Err(ScopeError::InvalidConfig(
                "digest_ttl must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The scheduler delay as a `Duration`.
    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            digest_ttl: DEFAULT_DIGEST_TTL,
            defer_delay_ms: 0,
        }
    }
}
