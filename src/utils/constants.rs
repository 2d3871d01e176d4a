//! Shared configuration constants for the scraper
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Identifier stamped into every persisted record's metadata
pub const DEFAULT_SCRAPER_ID: &str = "erwait-chromium";

/// Version stamped into every persisted record's metadata
pub const SCRAPER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target scraped when no configuration file is supplied
pub const DEFAULT_TARGET_URL: &str = "https://www.example-klinikum.de/notaufnahme/wartezeit";

/// Department tag of the default target
pub const DEFAULT_DEPARTMENT: &str = "emergency";

/// Default schedule: every ten minutes
pub const DEFAULT_SCHEDULE: &str = "*/10 * * * *";

/// Health checks run every five minutes
pub const DEFAULT_HEALTH_SCHEDULE: &str = "*/5 * * * *";

/// Viewport used for consistent desktop rendering
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Timeout for `page.goto()` operations
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Timeout for CDP requests issued by the browser handler
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ceiling for the `document.readyState` poll after navigation
pub const READY_STATE_TIMEOUT_SECS: u64 = 10;

/// Poll interval for `document.readyState`
pub const READY_STATE_POLL_MS: u64 = 100;

/// Short timeout used for each readiness selector probe
pub const READINESS_SELECTOR_TIMEOUT_MS: u64 = 2_000;

/// Fixed settle delay after the page reports ready
///
/// The target site renders its numbers with a client-side widget that
/// lands shortly after `readyState === 'complete'`.
pub const SETTLE_DELAY_MS: u64 = 1_500;

/// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Number of job executions kept for rolling statistics
pub const EXECUTION_HISTORY_CAPACITY: usize = 100;

/// Ceiling for the job runner to wait on an in-flight job during shutdown
pub const JOB_SHUTDOWN_TIMEOUT_SECS: u64 = 60;

/// Ceiling for the scheduler to wait on each running job during shutdown
pub const SCHEDULER_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Poll interval for wait-with-timeout shutdown loops
pub const SHUTDOWN_POLL_INTERVAL_MS: u64 = 100;

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
