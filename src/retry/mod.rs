//! Retry engine
//!
//! Generic bounded-retry-with-backoff executor. Errors are classified as
//! retryable or fatal by signature; retryable failures back off
//! exponentially with jitter until the attempt budget is spent.

pub mod config;
pub mod engine;

pub use config::{DEFAULT_RETRYABLE_SIGNATURES, JITTER_RATIO, RetryConfig, RetryFilter};
pub use engine::{RetryAttemptState, RetryOutcome, RetryableError, execute, execute_with};
