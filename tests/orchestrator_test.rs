//! Scrape orchestration over a scripted capture source

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{ScriptedSource, fast_retry, navigation_timeout, scraper_with, target};
use erwait::scrape_engine::{ExtractionRetryPolicy, ScrapeError};

mod common;

#[tokio::test]
async fn test_three_timeouts_then_success() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_script(vec![
        Err(navigation_timeout()),
        Err(navigation_timeout()),
        Err(navigation_timeout()),
    ]));
    let (scraper, metrics) = scraper_with(source.clone(), fast_retry(5), ExtractionRetryPolicy::FailFast);

    let result = scraper.scrape(&target("emergency")).await;

    assert!(result.success);
    assert_eq!(result.metrics.retries, 3);
    assert_eq!(result.metrics.attempts, 4);
    assert_eq!(source.captures(), 4);

    let record = result.record.expect("record on success");
    assert_eq!(record.metric.wait_time_minutes, 45);
    assert_eq!(record.metric.total_patients, Some(12));
    assert_eq!(record.metric.update_delay_minutes, Some(3));
    assert_eq!(record.metadata.browser_type, "scripted");
    assert_eq!(record.metadata.user_agent.as_deref(), Some("test-agent"));
    assert!(result.quality_score.is_some());

    let snap = metrics.snapshot();
    assert_eq!(snap.scrape_attempts, 1);
    assert_eq!(snap.scrape_successes, 1);
    assert_eq!(snap.retries, 3);
    assert_eq!(snap.last_wait_time_minutes, 45);
}

#[tokio::test]
async fn test_exhausted_retries_report_last_error() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_script(vec![
        Err(navigation_timeout()),
        Err(ScrapeError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())),
    ]));
    let (scraper, metrics) = scraper_with(source.clone(), fast_retry(2), ExtractionRetryPolicy::FailFast);

    let result = scraper.scrape(&target("emergency")).await;

    assert!(!result.success);
    assert!(result.record.is_none());
    assert_eq!(result.metrics.retries, 1);
    assert_eq!(result.error_kind.as_deref(), Some("NavigationError"));
    assert!(result.error.as_deref().unwrap_or("").contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(metrics.snapshot().scrape_failures, 1);
}

#[tokio::test]
async fn test_every_opened_page_is_closed() {
    let source = Arc::new(ScriptedSource::new("Wartezeit: 9999 min").with_script(vec![
        Err(navigation_timeout()),
        Ok(common::PAGE_TEXT.to_string()),
    ]));
    let (scraper, _) = scraper_with(source.clone(), fast_retry(3), ExtractionRetryPolicy::FailFast);

    assert!(scraper.scrape(&target("emergency")).await.success);
    assert!(!scraper.scrape(&target("pediatrics")).await.success);

    let opened = source.pages_opened.load(Ordering::SeqCst);
    assert_eq!(opened, 3);
    assert_eq!(source.pages_closed.load(Ordering::SeqCst), opened);
}

#[tokio::test]
async fn test_extraction_policy_controls_retries() {
    let fail_fast = Arc::new(ScriptedSource::new("Notaufnahme geöffnet"));
    let (scraper, _) = scraper_with(fail_fast.clone(), fast_retry(4), ExtractionRetryPolicy::FailFast);
    let result = scraper.scrape(&target("emergency")).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Could not extract wait time from page"));
    assert_eq!(fail_fast.captures(), 1);

    let budgeted = Arc::new(ScriptedSource::new("Notaufnahme geöffnet"));
    let (scraper, _) = scraper_with(budgeted.clone(), fast_retry(4), ExtractionRetryPolicy::RetryWithBudget);
    let result = scraper.scrape(&target("emergency")).await;
    assert!(!result.success);
    assert_eq!(result.metrics.attempts, 4);
    assert_eq!(budgeted.captures(), 4);
}

#[tokio::test]
async fn test_each_scrape_gets_its_own_correlation_id() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT));
    let (scraper, _) = scraper_with(source, fast_retry(1), ExtractionRetryPolicy::FailFast);

    let a = scraper.scrape(&target("emergency")).await;
    let b = scraper.scrape(&target("emergency")).await;
    assert_ne!(a.correlation_id, b.correlation_id);
    assert_ne!(a.record.unwrap().id, b.record.unwrap().id);
}
