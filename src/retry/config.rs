//! Retry policy configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};

/// Fraction of the computed delay added or removed at random
pub const JITTER_RATIO: f64 = 0.25;

/// Error signatures treated as transient by default
///
/// Matched case-insensitively as substrings of the error kind name or message.
pub const DEFAULT_RETRYABLE_SIGNATURES: &[&str] = &[
    // timeouts
    "TimeoutError",
    "timeout",
    "timed out",
    // network resets
    "ECONNRESET",
    "connection reset",
    "socket hang up",
    // DNS
    "ENOTFOUND",
    "ERR_NAME_NOT_RESOLVED",
    "dns",
    // refusals
    "ECONNREFUSED",
    "connection refused",
    "ERR_CONNECTION_REFUSED",
    // navigation and browser protocol
    "NavigationError",
    "net::ERR_",
    "ProtocolError",
    "protocol error",
    "Target closed",
    "Session closed",
];

/// Which failures the engine may retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "signatures")]
pub enum RetryFilter {
    /// Every error is retried until the attempt budget runs out
    Any,
    /// Only errors whose kind name or message contains one of these
    Signatures(Vec<String>),
}

impl RetryFilter {
    #[must_use]
    pub fn default_signatures() -> Self {
        Self::Signatures(
            DEFAULT_RETRYABLE_SIGNATURES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )
    }

    #[must_use]
    pub fn matches(&self, kind_name: &str, message: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Signatures(signatures) => {
                let kind_name = kind_name.to_lowercase();
                let message = message.to_lowercase();
                signatures.iter().any(|sig| {
                    let sig = sig.to_lowercase();
                    kind_name.contains(&sig) || message.contains(&sig)
                })
            }
        }
    }
}

impl Default for RetryFilter {
    fn default() -> Self {
        Self::default_signatures()
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable: RetryFilter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable: RetryFilter::default(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, retryable: RetryFilter) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attempt budget, never below one
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff before the retry that follows `attempt` (1-based), without jitter
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Backoff with ±25% jitter applied
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt).as_millis() as f64;
        let factor = 1.0 + rand::rng().random_range(-JITTER_RATIO..=JITTER_RATIO);
        Duration::from_millis((base * factor).round().max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_then_caps() {
        let config = RetryConfig::default().with_delays(100, 1_000);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(1_000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let config = RetryConfig::default().with_delays(1_000, 10_000);
        for _ in 0..200 {
            let delay = config.jittered_delay(1).as_millis();
            assert!((750..=1_250).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn test_signature_match_is_case_insensitive() {
        let filter = RetryFilter::default_signatures();
        assert!(filter.matches("TimeoutError", "Page navigation timeout after 30000ms"));
        assert!(filter.matches("Error", "net::ERR_CONNECTION_RESET at https://x"));
        assert!(filter.matches("ProtocolError", "session closed"));
        assert!(!filter.matches("ExtractionError", "Could not extract wait time from page"));
        assert!(RetryFilter::Any.matches("ExtractionError", "anything"));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        assert_eq!(RetryConfig::default().with_max_attempts(0).attempt_budget(), 1);
    }
}
