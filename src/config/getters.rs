//! Accessors for `ScraperConfig`

use super::types::{BrowserSettings, ReadinessSettings, ScraperConfig};
use crate::model::ScrapeTarget;
use crate::retry::RetryConfig;
use crate::scrape_engine::ExtractionRetryPolicy;
use std::time::Duration;

impl ScraperConfig {
    #[must_use]
    pub fn scraper_id(&self) -> &str {
        &self.scraper_id
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn targets(&self) -> &[ScrapeTarget] {
        &self.targets
    }

    #[must_use]
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    #[must_use]
    pub fn health_schedule(&self) -> &str {
        &self.health_schedule
    }

    #[must_use]
    pub fn run_on_startup(&self) -> bool {
        self.run_on_startup
    }

    #[must_use]
    pub fn browser(&self) -> &BrowserSettings {
        &self.browser
    }

    #[must_use]
    pub fn readiness(&self) -> &ReadinessSettings {
        &self.readiness
    }

    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    #[must_use]
    pub fn extraction_policy(&self) -> ExtractionRetryPolicy {
        self.extraction_policy
    }

    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// How long the job runner waits for an in-flight job during shutdown
    #[must_use]
    pub fn job_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.job_shutdown_timeout_secs)
    }

    /// Per-job wait ceiling for scheduler shutdown
    #[must_use]
    pub fn scheduler_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler_shutdown_timeout_secs)
    }

    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }
}
