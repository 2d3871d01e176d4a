//! Core configuration types for the scraper
//!
//! `ScraperConfig` is loaded from JSON (every field has a default) or built
//! through `ScraperConfig::builder()`. Either way `validate()` runs before the
//! pipeline sees it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::model::ScrapeTarget;
use crate::retry::RetryConfig;
use crate::scrape_engine::ExtractionRetryPolicy;
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_DEPARTMENT, DEFAULT_HEALTH_SCHEDULE, DEFAULT_NAVIGATION_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCHEDULE, DEFAULT_SCRAPER_ID, DEFAULT_TARGET_URL,
    DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, EXECUTION_HISTORY_CAPACITY,
    JOB_SHUTDOWN_TIMEOUT_SECS, READINESS_SELECTOR_TIMEOUT_MS, READY_STATE_TIMEOUT_SECS,
    SCHEDULER_SHUTDOWN_TIMEOUT_SECS, SCRAPER_VERSION, SETTLE_DELAY_MS,
};

/// Browser family to launch
///
/// All three speak the DevTools protocol and behave the same once running;
/// they only differ in where the executable is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Chrome,
    Edge,
}

impl BrowserEngine {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings applied when the browser process and its context are created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub engine: BrowserEngine,
    pub headless: bool,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// e.g. `http://proxy.internal:3128`
    pub proxy_server: Option<String>,
    /// Timeout for `page.goto()` and `wait_for_navigation()`
    pub navigation_timeout_secs: u64,
    /// Timeout for individual CDP requests
    pub request_timeout_secs: u64,
    /// Profile directory; a per-process temp dir when unset
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::default(),
            headless: true,
            user_agent: CHROME_USER_AGENT.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            proxy_server: None,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_data_dir: None,
        }
    }
}

impl BrowserSettings {
    /// `WIDTHxHEIGHT`, as stamped into record metadata
    #[must_use]
    pub fn screen_resolution(&self) -> String {
        format!("{}x{}", self.viewport_width, self.viewport_height)
    }
}

/// Heuristics used to decide a page has finished rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    /// Ceiling for the `document.readyState` poll
    pub ready_state_timeout_secs: u64,
    /// Per-selector presence probe timeout
    pub selector_timeout_ms: u64,
    /// Fixed delay after readiness before capturing
    pub settle_delay_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            ready_state_timeout_secs: READY_STATE_TIMEOUT_SECS,
            selector_timeout_ms: READINESS_SELECTOR_TIMEOUT_MS,
            settle_delay_ms: SETTLE_DELAY_MS,
        }
    }
}

/// Main configuration for the scrape pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub(crate) scraper_id: String,
    pub(crate) version: String,
    /// Scraped sequentially, in this order, on every job run
    pub(crate) targets: Vec<ScrapeTarget>,
    /// Cron expression for the scrape job
    pub(crate) schedule: String,
    /// Cron expression for the health-check job
    pub(crate) health_schedule: String,
    pub(crate) run_on_startup: bool,
    pub(crate) browser: BrowserSettings,
    pub(crate) readiness: ReadinessSettings,
    pub(crate) retry: RetryConfig,
    pub(crate) extraction_policy: ExtractionRetryPolicy,
    pub(crate) history_capacity: usize,
    pub(crate) job_shutdown_timeout_secs: u64,
    pub(crate) scheduler_shutdown_timeout_secs: u64,
    /// `sqlite://` URL; records stay in memory when unset
    pub(crate) database_url: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            scraper_id: DEFAULT_SCRAPER_ID.to_string(),
            version: SCRAPER_VERSION.to_string(),
            targets: vec![ScrapeTarget::new(DEFAULT_TARGET_URL, DEFAULT_DEPARTMENT)],
            schedule: DEFAULT_SCHEDULE.to_string(),
            health_schedule: DEFAULT_HEALTH_SCHEDULE.to_string(),
            run_on_startup: true,
            browser: BrowserSettings::default(),
            readiness: ReadinessSettings::default(),
            retry: RetryConfig::default(),
            extraction_policy: ExtractionRetryPolicy::default(),
            history_capacity: EXECUTION_HISTORY_CAPACITY,
            job_shutdown_timeout_secs: JOB_SHUTDOWN_TIMEOUT_SECS,
            scheduler_shutdown_timeout_secs: SCHEDULER_SHUTDOWN_TIMEOUT_SECS,
            database_url: None,
        }
    }
}
