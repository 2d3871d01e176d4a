//! Shared fixtures for the integration tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use erwait::field_extractor::RawFieldCapture;
use erwait::model::{HospitalMetricRecord, ParsedMetric, RecordMetadata, ScrapeTarget};
use erwait::retry::RetryConfig;
use erwait::scrape_engine::{
    CaptureSource, ExtractionRetryPolicy, PageCapture, ScrapeContext, ScrapeError, ScrapeResult, Scraper,
    ScraperOptions, SourceInfo,
};
use erwait::storage::{
    InMemoryStore, MetricQuery, MetricStore, QueryResult, StorageError, StorageHealth, StorageResult,
};
use erwait::telemetry::ScraperMetrics;
use parking_lot::Mutex;

pub const PAGE_TEXT: &str = "Wartezeit: 45 min\nAktualisiert vor 3 min\nPatienten in Behandlung: 12";

/// Retry settings with millisecond backoff
#[allow(dead_code)]
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_attempts(max_attempts)
        .with_delays(1, 5)
}

#[allow(dead_code)]
pub fn target(department: &str) -> ScrapeTarget {
    ScrapeTarget::new(format!("https://example.org/{department}"), department)
}

#[allow(dead_code)]
pub fn sample_record(department: &str, wait_time_minutes: u32) -> HospitalMetricRecord {
    let metadata = RecordMetadata {
        scraper_id: "test-scraper".into(),
        version: "0.0.0".into(),
        processing_time_ms: 5,
        browser_type: "chromium".into(),
        user_agent: None,
        screen_resolution: Some("1920x1080".into()),
        error_message: None,
    };
    HospitalMetricRecord::new(
        &target(department),
        ParsedMetric {
            total_patients: Some(12),
            ..ParsedMetric::with_wait_time(wait_time_minutes)
        },
        metadata,
    )
}

/// Capture source that replays scripted page texts and errors
///
/// Each `capture` pops the next step; once the script is empty the fallback
/// page text is served. Opened and closed pages are counted so tests can
/// check the page lifecycle.
pub struct ScriptedSource {
    script: Mutex<VecDeque<ScrapeResult<String>>>,
    fallback: String,
    delay: Duration,
    probe_delay: Duration,
    pub captures: AtomicU32,
    pub pages_opened: AtomicU32,
    pub pages_closed: AtomicU32,
    pub shutdowns: AtomicU32,
    pub probe_fails: AtomicBool,
    /// Pages open right now, captures and probes together
    open_pages: AtomicU32,
    pub max_open_pages: AtomicU32,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new(fallback: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            captures: AtomicU32::new(0),
            pages_opened: AtomicU32::new(0),
            pages_closed: AtomicU32::new(0),
            shutdowns: AtomicU32::new(0),
            probe_fails: AtomicBool::new(false),
            open_pages: AtomicU32::new(0),
            max_open_pages: AtomicU32::new(0),
        }
    }

    /// Each probe keeps its page open for `delay`
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    fn open_page(&self) {
        let open = self.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_pages.fetch_max(open, Ordering::SeqCst);
    }

    fn close_page(&self) {
        self.open_pages.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn with_script(self, steps: Vec<ScrapeResult<String>>) -> Self {
        *self.script.lock() = steps.into();
        self
    }

    /// Each capture takes at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureSource for ScriptedSource {
    async fn initialize(&self) -> ScrapeResult<()> {
        Ok(())
    }

    async fn capture(&self, _ctx: &ScrapeContext) -> ScrapeResult<PageCapture> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        self.open_page();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));

        self.pages_closed.fetch_add(1, Ordering::SeqCst);
        self.close_page();
        step.map(|text| PageCapture {
            raw: RawFieldCapture::from_page_text(text),
            page_load_ms: 20,
            capture_ms: 1,
        })
    }

    async fn probe(&self) -> ScrapeResult<()> {
        self.open_page();
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.close_page();
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(ScrapeError::Protocol("Target closed".into()));
        }
        Ok(())
    }

    async fn shutdown(&self) -> ScrapeResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> SourceInfo {
        SourceInfo {
            browser_type: "scripted".into(),
            user_agent: Some("test-agent".into()),
            screen_resolution: Some("1920x1080".into()),
        }
    }
}

#[allow(dead_code)]
pub fn navigation_timeout() -> ScrapeError {
    ScrapeError::timeout("Page navigation", 30_000)
}

#[allow(dead_code)]
pub fn scraper_with(
    source: Arc<ScriptedSource>,
    retry: RetryConfig,
    policy: ExtractionRetryPolicy,
) -> (Scraper, ScraperMetrics) {
    let metrics = ScraperMetrics::new();
    let options = ScraperOptions {
        scraper_id: "test-scraper".into(),
        version: "0.0.0".into(),
        retry,
        extraction_policy: policy,
    };
    (Scraper::new(source, options, metrics.clone()), metrics)
}

/// Store whose inserts can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    pub fail_inserts: AtomicBool,
    pub disconnects: AtomicU32,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl MetricStore for FlakyStore {
    async fn connect(&self) -> StorageResult<()> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> StorageResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.inner.disconnect().await
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn health_check(&self) -> StorageHealth {
        self.inner.health_check().await
    }

    async fn insert(&self, record: &HospitalMetricRecord) -> StorageResult<String> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Query("database is locked".into()));
        }
        self.inner.insert(record).await
    }

    async fn query(&self, filter: &MetricQuery) -> StorageResult<QueryResult> {
        self.inner.query(filter).await
    }
}
