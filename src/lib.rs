pub mod browser;
pub mod browser_setup;
pub mod config;
pub mod field_extractor;
pub mod jobs;
pub mod model;
pub mod retry;
pub mod scheduler;
pub mod scrape_engine;
pub mod storage;
pub mod telemetry;
pub mod utils;

pub use browser::{BrowserSessionManager, LoggingObserver, ManagedPage, PageEvent, PageObserver};
pub use browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use config::{BrowserEngine, ConfigError, ScraperConfig};
pub use field_extractor::{extract_metric, extract_patient_count, extract_update_delay, extract_wait_time};
pub use jobs::{HealthReport, JobError, JobExecutionResult, JobRunner, JobStatistics};
pub use model::{HospitalMetricRecord, ParsedMetric, RecordMetadata, ScrapeTarget};
pub use retry::{RetryConfig, RetryOutcome};
pub use scheduler::{ScheduleConfig, Scheduler, SchedulerError, job_handler};
pub use scrape_engine::{
    BrowserCapture, CaptureSource, ExtractionRetryPolicy, ScrapeError, Scraper, ScraperOptions,
    ScrapingResult,
};
pub use storage::{InMemoryStore, MetricStore, SqliteStore, StorageError};
pub use telemetry::{ScraperMetrics, init_logging};

use std::sync::Arc;

/// Wire the browser-backed pipeline from `config`
///
/// Nothing is launched or connected here; call `JobRunner::initialize()`.
#[must_use]
pub fn build_runner(config: &ScraperConfig, store: Arc<dyn MetricStore>, metrics: ScraperMetrics) -> JobRunner {
    let session = Arc::new(BrowserSessionManager::new(config.browser().clone()));
    session.add_observer(Arc::new(LoggingObserver));

    let source = Arc::new(BrowserCapture::new(session, config.readiness().clone()));
    let scraper = Arc::new(Scraper::new(source, ScraperOptions::from_config(config), metrics));
    JobRunner::from_config(scraper, store, config)
}
