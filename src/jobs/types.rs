use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::StorageHealth;

/// Outcome of one `execute_scraping_job` run
///
/// Scrape success and persistence success are counted separately: a run
/// whose inserts all failed is still successful if a target was scraped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionResult {
    pub job_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
    pub records_inserted: u32,
    pub error: Option<String>,
    pub targets_attempted: u32,
    pub scrapes_succeeded: u32,
    pub insert_failures: u32,
    pub duration_ms: u64,
}

/// Rolling statistics over the retained history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// 0.0 when nothing has run yet
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_records_inserted: u64,
    pub last_run: Option<DateTime<Utc>>,
}

/// Combined storage and browser liveness
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub storage: StorageHealth,
    pub scraper_alive: bool,
    pub scraper_error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Another run is in flight; runs never queue
    #[error("A scraping job is already running")]
    AlreadyRunning,

    #[error("Job runner is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),

    #[error(transparent)]
    Scrape(#[from] crate::scrape_engine::ScrapeError),
}
