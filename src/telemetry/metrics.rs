use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bounds (ms) of the scrape duration histogram buckets
pub const DURATION_BUCKETS_MS: [u64; 8] = [500, 1_000, 2_500, 5_000, 10_000, 30_000, 60_000, 120_000];

/// Counters, gauges and a duration histogram for the scrape pipeline
///
/// All counters use `Ordering::SeqCst` so snapshot reads are coherent.
/// Recording never fails and never blocks.
#[derive(Debug, Clone)]
pub struct ScraperMetrics {
    scrape_attempts: Arc<AtomicU64>,
    scrape_successes: Arc<AtomicU64>,
    scrape_failures: Arc<AtomicU64>,
    retries: Arc<AtomicU64>,
    records_inserted: Arc<AtomicU64>,
    insert_failures: Arc<AtomicU64>,
    jobs_started: Arc<AtomicU64>,
    jobs_succeeded: Arc<AtomicU64>,
    jobs_failed: Arc<AtomicU64>,
    jobs_skipped: Arc<AtomicU64>,
    health_checks_failed: Arc<AtomicU64>,
    last_wait_time_minutes: Arc<AtomicU64>,
    /// Quality score scaled by 1000
    last_quality_milli: Arc<AtomicU64>,
    duration_buckets: Arc<[AtomicU64; DURATION_BUCKETS_MS.len() + 1]>,
    duration_total_ms: Arc<AtomicU64>,
}

impl ScraperMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scrape_attempts: Arc::new(AtomicU64::new(0)),
            scrape_successes: Arc::new(AtomicU64::new(0)),
            scrape_failures: Arc::new(AtomicU64::new(0)),
            retries: Arc::new(AtomicU64::new(0)),
            records_inserted: Arc::new(AtomicU64::new(0)),
            insert_failures: Arc::new(AtomicU64::new(0)),
            jobs_started: Arc::new(AtomicU64::new(0)),
            jobs_succeeded: Arc::new(AtomicU64::new(0)),
            jobs_failed: Arc::new(AtomicU64::new(0)),
            jobs_skipped: Arc::new(AtomicU64::new(0)),
            health_checks_failed: Arc::new(AtomicU64::new(0)),
            last_wait_time_minutes: Arc::new(AtomicU64::new(0)),
            last_quality_milli: Arc::new(AtomicU64::new(0)),
            duration_buckets: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
            duration_total_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_scrape_attempt(&self) {
        self.scrape_attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_scrape_success(&self, duration: Duration, retries: u32, wait_time_minutes: u32, quality: f64) {
        self.scrape_successes.fetch_add(1, Ordering::SeqCst);
        self.retries.fetch_add(u64::from(retries), Ordering::SeqCst);
        self.last_wait_time_minutes
            .store(u64::from(wait_time_minutes), Ordering::SeqCst);
        self.last_quality_milli
            .store((quality.clamp(0.0, 1.0) * 1000.0).round() as u64, Ordering::SeqCst);
        self.observe_duration(duration);
    }

    pub fn record_scrape_failure(&self, duration: Duration, retries: u32) {
        self.scrape_failures.fetch_add(1, Ordering::SeqCst);
        self.retries.fetch_add(u64::from(retries), Ordering::SeqCst);
        self.observe_duration(duration);
    }

    pub fn record_insert(&self) {
        self.records_inserted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_insert_failure(&self) {
        self.insert_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_job_finished(&self, success: bool) {
        if success {
            self.jobs_succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.jobs_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_job_skipped(&self) {
        self.jobs_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_health_check(&self, healthy: bool) {
        if !healthy {
            self.health_checks_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn observe_duration(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.duration_total_ms.fetch_add(ms, Ordering::SeqCst);
        let idx = DURATION_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(DURATION_BUCKETS_MS.len());
        self.duration_buckets[idx].fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scrape_attempts: self.scrape_attempts.load(Ordering::SeqCst),
            scrape_successes: self.scrape_successes.load(Ordering::SeqCst),
            scrape_failures: self.scrape_failures.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            records_inserted: self.records_inserted.load(Ordering::SeqCst),
            insert_failures: self.insert_failures.load(Ordering::SeqCst),
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::SeqCst),
            jobs_failed: self.jobs_failed.load(Ordering::SeqCst),
            jobs_skipped: self.jobs_skipped.load(Ordering::SeqCst),
            health_checks_failed: self.health_checks_failed.load(Ordering::SeqCst),
            last_wait_time_minutes: self.last_wait_time_minutes.load(Ordering::SeqCst),
            last_quality_score: self.last_quality_milli.load(Ordering::SeqCst) as f64 / 1000.0,
            duration_buckets: std::array::from_fn(|i| self.duration_buckets[i].load(Ordering::SeqCst)),
            duration_total_ms: self.duration_total_ms.load(Ordering::SeqCst),
        }
    }
}

impl Default for ScraperMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub scrape_attempts: u64,
    pub scrape_successes: u64,
    pub scrape_failures: u64,
    pub retries: u64,
    pub records_inserted: u64,
    pub insert_failures: u64,
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_skipped: u64,
    pub health_checks_failed: u64,
    pub last_wait_time_minutes: u64,
    pub last_quality_score: f64,
    /// Counts per `DURATION_BUCKETS_MS` bound, last slot is overflow
    pub duration_buckets: [u64; DURATION_BUCKETS_MS.len() + 1],
    pub duration_total_ms: u64,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn scrape_success_rate(&self) -> f64 {
        let finished = self.scrape_successes + self.scrape_failures;
        if finished == 0 {
            return 1.0;
        }
        self.scrape_successes as f64 / finished as f64
    }

    #[must_use]
    pub fn average_scrape_ms(&self) -> f64 {
        let finished = self.scrape_successes + self.scrape_failures;
        if finished == 0 {
            return 0.0;
        }
        self.duration_total_ms as f64 / finished as f64
    }
}
