//! Scrape orchestration
//!
//! One `scrape()` call drives a target through:
//! - capture on a fresh page (via [`CaptureSource`])
//! - field parsing and validation
//! - bounded retry of transient failures
//! - record assembly with provenance metadata
//!
//! Failures never escape as errors; they are folded into the
//! [`ScrapingResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, info, warn};

use super::context::{ExtractionRetryPolicy, ScrapeContext, ScrapeTimings, ScrapingResult};
use super::errors::ScrapeResult;
use super::source::{CaptureSource, SourceInfo};
use crate::config::ScraperConfig;
use crate::field_extractor::{extract_metric, quality_score};
use crate::model::{HospitalMetricRecord, ParsedMetric, RecordMetadata, ScrapeTarget};
use crate::retry::{RetryConfig, execute_with};
use crate::telemetry::ScraperMetrics;

/// Knobs the orchestrator needs from the full configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperOptions {
    pub scraper_id: String,
    pub version: String,
    pub retry: RetryConfig,
    pub extraction_policy: ExtractionRetryPolicy,
}

impl ScraperOptions {
    #[must_use]
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            scraper_id: config.scraper_id().to_string(),
            version: config.version().to_string(),
            retry: config.retry().clone(),
            extraction_policy: config.extraction_policy(),
        }
    }
}

/// Parsed metric of one attempt with its timings
struct AttemptOutput {
    metric: ParsedMetric,
    page_load_ms: u64,
    extraction_ms: u64,
}

pub struct Scraper {
    source: Arc<dyn CaptureSource>,
    options: ScraperOptions,
    metrics: ScraperMetrics,
}

impl Scraper {
    #[must_use]
    pub fn new(source: Arc<dyn CaptureSource>, options: ScraperOptions, metrics: ScraperMetrics) -> Self {
        Self {
            source,
            options,
            metrics,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ScraperOptions {
        &self.options
    }

    #[must_use]
    pub fn metrics(&self) -> &ScraperMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn source_info(&self) -> SourceInfo {
        self.source.describe()
    }

    pub async fn initialize(&self) -> ScrapeResult<()> {
        self.source.initialize().await
    }

    pub async fn probe(&self) -> ScrapeResult<()> {
        self.source.probe().await
    }

    pub async fn shutdown(&self) -> ScrapeResult<()> {
        self.source.shutdown().await
    }

    /// Scrape one target, retrying transient failures
    pub async fn scrape(&self, target: &ScrapeTarget) -> ScrapingResult {
        let ctx = ScrapeContext::new(target.clone());
        let span = ctx.span.clone();
        self.scrape_in_context(&ctx).instrument(span).await
    }

    async fn scrape_in_context(&self, ctx: &ScrapeContext) -> ScrapingResult {
        info!("Scraping {}", ctx.target);
        self.metrics.record_scrape_attempt();

        let policy = self.options.extraction_policy;
        let filter = self.options.retry.retryable.clone();
        let name = format!("scrape[{}]", ctx.correlation_id);

        let outcome = execute_with(
            || self.attempt(ctx),
            &name,
            &self.options.retry,
            |err| policy.should_retry(err, &filter),
        )
        .await;

        let attempts = outcome.attempts;
        let retries = outcome.retries();
        let total_ms = outcome.total_time_ms;
        let duration = Duration::from_millis(total_ms);

        match outcome.result {
            Ok(output) => {
                let quality = quality_score(&output.metric);
                let info = self.source.describe();
                let metadata = RecordMetadata {
                    scraper_id: self.options.scraper_id.clone(),
                    version: self.options.version.clone(),
                    processing_time_ms: total_ms,
                    browser_type: info.browser_type,
                    user_agent: info.user_agent,
                    screen_resolution: info.screen_resolution,
                    error_message: None,
                };
                let record = HospitalMetricRecord::new(&ctx.target, output.metric, metadata);

                self.metrics.record_scrape_success(
                    duration,
                    retries,
                    output.metric.wait_time_minutes,
                    quality,
                );
                info!(
                    wait_time = output.metric.wait_time_minutes,
                    quality,
                    attempts,
                    "Scrape succeeded in {total_ms}ms"
                );

                ScrapingResult {
                    success: true,
                    correlation_id: ctx.correlation_id.clone(),
                    target: ctx.target.clone(),
                    record: Some(record),
                    error: None,
                    error_kind: None,
                    metrics: ScrapeTimings {
                        page_load_ms: output.page_load_ms,
                        extraction_ms: output.extraction_ms,
                        total_ms,
                        attempts,
                        retries,
                    },
                    quality_score: Some(quality),
                }
            }
            Err(err) => {
                self.metrics.record_scrape_failure(duration, retries);
                warn!(
                    error_kind = err.kind_name(),
                    attempts,
                    "Scrape failed after {total_ms}ms: {err}"
                );

                ScrapingResult {
                    success: false,
                    correlation_id: ctx.correlation_id.clone(),
                    target: ctx.target.clone(),
                    record: None,
                    error: Some(err.to_string()),
                    error_kind: Some(err.kind_name().to_string()),
                    metrics: ScrapeTimings {
                        total_ms,
                        attempts,
                        retries,
                        ..ScrapeTimings::default()
                    },
                    quality_score: None,
                }
            }
        }
    }

    async fn attempt(&self, ctx: &ScrapeContext) -> ScrapeResult<AttemptOutput> {
        let capture = self.source.capture(ctx).await?;

        let parse_started = Instant::now();
        let metric = extract_metric(&capture.raw)?;

        Ok(AttemptOutput {
            metric,
            page_load_ms: capture.page_load_ms,
            extraction_ms: capture.capture_ms + parse_started.elapsed().as_millis() as u64,
        })
    }
}
