//! Observability for the scrape pipeline
//!
//! Metrics are plain atomics read through `snapshot()`; logs and spans go
//! through `tracing`. Nothing in here returns an error.

pub mod metrics;

pub use metrics::{DURATION_BUCKETS_MS, MetricsSnapshot, ScraperMetrics};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` (default `info`)
///
/// `log` records from the retry and storage modules are bridged through
/// `tracing-log`. Calling this twice is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
