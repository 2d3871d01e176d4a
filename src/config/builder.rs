//! Type-safe builder for `ScraperConfig` using the typestate pattern
//!
//! `build()` only exists once at least one target has been supplied.

use anyhow::{Context, Result};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{BrowserEngine, ScraperConfig};
use crate::model::ScrapeTarget;
use crate::retry::RetryConfig;
use crate::scrape_engine::ExtractionRetryPolicy;

// Type states for the builder
pub struct WithTargets;

pub struct ScraperConfigBuilder<State = ()> {
    pub(crate) config: ScraperConfig,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ScraperConfigBuilder<()> {
    fn default() -> Self {
        Self {
            config: ScraperConfig {
                targets: Vec::new(),
                ..ScraperConfig::default()
            },
            _phantom: PhantomData,
        }
    }
}

impl ScraperConfig {
    /// Create a builder for configuring a `ScraperConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ScraperConfigBuilder<()> {
        ScraperConfigBuilder::default()
    }
}

impl ScraperConfigBuilder<()> {
    pub fn targets(self, targets: impl IntoIterator<Item = ScrapeTarget>) -> ScraperConfigBuilder<WithTargets> {
        let mut config = self.config;
        config.targets = targets.into_iter().collect();
        ScraperConfigBuilder {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn target(
        self,
        url: impl Into<String>,
        department: impl Into<String>,
    ) -> ScraperConfigBuilder<WithTargets> {
        self.targets([ScrapeTarget::new(url, department)])
    }
}

impl ScraperConfigBuilder<WithTargets> {
    /// Append another target after the ones already set
    #[must_use]
    pub fn target(mut self, url: impl Into<String>, department: impl Into<String>) -> Self {
        self.config.targets.push(ScrapeTarget::new(url, department));
        self
    }

    /// Validate and produce the final configuration
    ///
    /// # Errors
    ///
    /// Fails on unparseable target URLs, empty departments, malformed cron
    /// expressions or zero-sized limits.
    pub fn build(self) -> Result<ScraperConfig> {
        self.config
            .validate()
            .context("invalid scraper configuration")?;
        Ok(self.config)
    }
}

// Setters available in any state
impl<State> ScraperConfigBuilder<State> {
    #[must_use]
    pub fn scraper_id(mut self, id: impl Into<String>) -> Self {
        self.config.scraper_id = id.into();
        self
    }

    #[must_use]
    pub fn schedule(mut self, cron_expression: impl Into<String>) -> Self {
        self.config.schedule = cron_expression.into();
        self
    }

    #[must_use]
    pub fn health_schedule(mut self, cron_expression: impl Into<String>) -> Self {
        self.config.health_schedule = cron_expression.into();
        self
    }

    #[must_use]
    pub fn run_on_startup(mut self, run: bool) -> Self {
        self.config.run_on_startup = run;
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: BrowserEngine) -> Self {
        self.config.browser.engine = engine;
        self
    }

    /// Headed mode is only honoured in debug builds
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        #[cfg(not(debug_assertions))]
        let headless = {
            if !headless {
                tracing::warn!("Forcing headless mode in release build");
            }
            true
        };
        self.config.browser.headless = headless;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.browser.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.browser.viewport_width = width;
        self.config.browser.viewport_height = height;
        self
    }

    #[must_use]
    pub fn proxy_server(mut self, proxy: impl Into<String>) -> Self {
        self.config.browser.proxy_server = Some(proxy.into());
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.browser.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.browser.user_data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, millis: u64) -> Self {
        self.config.readiness.settle_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    #[must_use]
    pub fn extraction_policy(mut self, policy: ExtractionRetryPolicy) -> Self {
        self.config.extraction_policy = policy;
        self
    }

    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    #[must_use]
    pub fn job_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.job_shutdown_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }
}
