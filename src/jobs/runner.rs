//! Job runner
//!
//! Executes one scraping pass over every configured target, persists the
//! resulting records and keeps a bounded execution history. Runs never
//! overlap: a second call while one is in flight is refused, not queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::history::ExecutionHistory;
use super::types::{HealthReport, JobError, JobExecutionResult, JobStatistics};
use crate::config::ScraperConfig;
use crate::model::ScrapeTarget;
use crate::scrape_engine::Scraper;
use crate::storage::MetricStore;
use crate::telemetry::ScraperMetrics;
use crate::utils::{EXECUTION_HISTORY_CAPACITY, JOB_SHUTDOWN_TIMEOUT_SECS, SHUTDOWN_POLL_INTERVAL_MS};

/// Clears the running flag when a run ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct JobRunner {
    scraper: Arc<Scraper>,
    store: Arc<dyn MetricStore>,
    targets: Vec<ScrapeTarget>,
    metrics: ScraperMetrics,
    running: AtomicBool,
    shutting_down: AtomicBool,
    /// Held by a job for its whole run and by a health probe for its page
    browser_in_use: tokio::sync::Mutex<()>,
    history: Mutex<ExecutionHistory>,
    shutdown_timeout: Duration,
}

impl JobRunner {
    #[must_use]
    pub fn new(scraper: Arc<Scraper>, store: Arc<dyn MetricStore>, targets: Vec<ScrapeTarget>) -> Self {
        let metrics = scraper.metrics().clone();
        Self {
            scraper,
            store,
            targets,
            metrics,
            running: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            browser_in_use: tokio::sync::Mutex::new(()),
            history: Mutex::new(ExecutionHistory::new(EXECUTION_HISTORY_CAPACITY)),
            shutdown_timeout: Duration::from_secs(JOB_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn from_config(scraper: Arc<Scraper>, store: Arc<dyn MetricStore>, config: &ScraperConfig) -> Self {
        Self::new(scraper, store, config.targets().to_vec())
            .with_history_capacity(config.history_capacity())
            .with_shutdown_timeout(config.job_shutdown_timeout())
    }

    #[must_use]
    pub fn with_history_capacity(self, capacity: usize) -> Self {
        *self.history.lock() = ExecutionHistory::new(capacity);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn targets(&self) -> &[ScrapeTarget] {
        &self.targets
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect storage, then bring up the capture source
    ///
    /// # Errors
    ///
    /// Storage could not connect, or the browser failed to launch.
    pub async fn initialize(&self) -> Result<(), JobError> {
        self.store.connect().await?;
        self.scraper.initialize().await?;
        info!(targets = self.targets.len(), "Job runner initialized");
        Ok(())
    }

    /// Scrape every target in order and persist successful records
    ///
    /// # Errors
    ///
    /// Only refusals: a run is already in flight, or shutdown has begun.
    /// Scrape and storage failures are reported in the returned result.
    pub async fn execute_scraping_job(&self) -> Result<JobExecutionResult, JobError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(JobError::ShuttingDown);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Scraping job already running, skipping this trigger");
            self.metrics.record_job_skipped();
            return Err(JobError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        // a health probe that is already on its page finishes first
        let _browser = self.browser_in_use.lock().await;

        let job_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("job", job_id = %job_id);
        let result = self.run_targets(job_id).instrument(span).await;

        self.metrics.record_job_finished(result.success);
        self.history.lock().push(result.clone());
        Ok(result)
    }

    async fn run_targets(&self, job_id: String) -> JobExecutionResult {
        let start_time = Utc::now();
        let started = Instant::now();
        self.metrics.record_job_started();
        info!("Starting scraping job over {} target(s)", self.targets.len());

        let mut scrapes_succeeded = 0u32;
        let mut records_inserted = 0u32;
        let mut insert_failures = 0u32;
        let mut errors = Vec::new();

        for target in &self.targets {
            let scraped = self.scraper.scrape(target).await;

            let Some(record) = scraped.record.filter(|_| scraped.success) else {
                let message = scraped.error.unwrap_or_else(|| "unknown error".to_string());
                errors.push(format!("{target}: {message}"));
                continue;
            };
            scrapes_succeeded += 1;

            match self.store.insert(&record).await {
                Ok(id) => {
                    records_inserted += 1;
                    self.metrics.record_insert();
                    debug!(record_id = %id, "Stored record for {target}");
                }
                Err(e) => {
                    insert_failures += 1;
                    self.metrics.record_insert_failure();
                    error!(correlation_id = %scraped.correlation_id, "Failed to store record for {target}: {e}");
                    errors.push(format!("{target}: insert failed: {e}"));
                }
            }
        }

        if self.targets.is_empty() {
            errors.push("No scrape targets configured".to_string());
        }

        let success = scrapes_succeeded > 0;
        let duration_ms = started.elapsed().as_millis() as u64;
        if success {
            info!(records_inserted, insert_failures, "Scraping job finished in {duration_ms}ms");
        } else {
            warn!("Scraping job failed after {duration_ms}ms");
        }

        JobExecutionResult {
            job_id,
            start_time,
            end_time: Utc::now(),
            success,
            records_inserted,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            targets_attempted: self.targets.len() as u32,
            scrapes_succeeded,
            insert_failures,
            duration_ms,
        }
    }

    /// Storage connectivity AND browser liveness
    ///
    /// While a job holds the browser it is not probed and counts as alive. A
    /// job starting during the probe waits for the probe's page to close.
    pub async fn perform_health_check(&self) -> HealthReport {
        let storage = self.store.health_check().await;

        let (scraper_alive, scraper_error) = match self.browser_in_use.try_lock() {
            Ok(_browser) => match self.scraper.probe().await {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            },
            Err(_) => {
                debug!("Job in flight, skipping browser probe");
                (true, None)
            }
        };

        let healthy = storage.connected && scraper_alive;
        self.metrics.record_health_check(healthy);
        if healthy {
            debug!(storage_ms = storage.response_time_ms, "Health check passed");
        } else {
            warn!(
                storage_connected = storage.connected,
                storage_error = storage.last_error.as_deref().unwrap_or(""),
                scraper_alive,
                scraper_error = scraper_error.as_deref().unwrap_or(""),
                "Health check failed"
            );
        }

        HealthReport {
            healthy,
            storage,
            scraper_alive,
            scraper_error,
            checked_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn statistics(&self) -> JobStatistics {
        self.history.lock().statistics()
    }

    /// Retained results, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<JobExecutionResult> {
        self.history.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn last_execution(&self) -> Option<JobExecutionResult> {
        self.history.lock().latest().cloned()
    }

    /// Wait for an in-flight run, then release the browser and storage
    ///
    /// The wait is bounded by the shutdown timeout; after it expires shutdown
    /// proceeds anyway. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        info!("Shutting down job runner");

        let deadline = Instant::now() + self.shutdown_timeout;
        while self.is_running() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(SHUTDOWN_POLL_INTERVAL_MS)).await;
        }
        if self.is_running() {
            warn!(
                "Job still running after {}s, continuing shutdown",
                self.shutdown_timeout.as_secs()
            );
        }

        if let Err(e) = self.scraper.shutdown().await {
            error!("Scraper shutdown failed: {e}");
        }
        if let Err(e) = self.store.disconnect().await {
            error!("Storage disconnect failed: {e}");
        }
        info!("Job runner stopped");
    }
}
