//! Job runner: persistence policy, overlap refusal, history and health

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FlakyStore, ScriptedSource, fast_retry, navigation_timeout, scraper_with, target};
use erwait::jobs::{JobError, JobRunner};
use erwait::scrape_engine::ExtractionRetryPolicy;
use erwait::storage::{InMemoryStore, MetricQuery, MetricStore};

mod common;

fn make_runner(source: Arc<ScriptedSource>, store: Arc<dyn MetricStore>, departments: &[&str]) -> JobRunner {
    let (scraper, _) = scraper_with(source, fast_retry(2), ExtractionRetryPolicy::FailFast);
    JobRunner::new(
        Arc::new(scraper),
        store,
        departments.iter().map(|d| target(d)).collect(),
    )
}

#[tokio::test]
async fn test_insert_failure_keeps_job_success() {
    let store = Arc::new(FlakyStore::failing());
    let runner = make_runner(
        Arc::new(ScriptedSource::new(common::PAGE_TEXT)),
        store.clone(),
        &["emergency"],
    );
    runner.initialize().await.unwrap();

    let result = runner.execute_scraping_job().await.unwrap();

    assert!(result.success);
    assert_eq!(result.records_inserted, 0);
    assert_eq!(result.scrapes_succeeded, 1);
    assert_eq!(result.insert_failures, 1);
    assert!(result.error.as_deref().unwrap_or("").contains("insert failed"));
    assert_eq!(store.stored(), 0);
}

#[tokio::test]
async fn test_targets_are_scraped_in_order_and_stored() {
    let store = Arc::new(InMemoryStore::new());
    let runner = make_runner(
        Arc::new(ScriptedSource::new(common::PAGE_TEXT)),
        store.clone(),
        &["emergency", "pediatrics", "trauma"],
    );
    runner.initialize().await.unwrap();

    let result = runner.execute_scraping_job().await.unwrap();

    assert!(result.success);
    assert_eq!(result.targets_attempted, 3);
    assert_eq!(result.records_inserted, 3);
    assert!(result.error.is_none());

    let departments: Vec<String> = store.records().into_iter().map(|r| r.department).collect();
    assert_eq!(departments, ["emergency", "pediatrics", "trauma"]);

    let queried = store
        .query(&MetricQuery::default().department("trauma"))
        .await
        .unwrap();
    assert_eq!(queried.total, 1);
}

#[tokio::test]
async fn test_partial_target_failure() {
    // first target exhausts both attempts, second succeeds
    let source = Arc::new(
        ScriptedSource::new(common::PAGE_TEXT)
            .with_script(vec![Err(navigation_timeout()), Err(navigation_timeout())]),
    );
    let store = Arc::new(InMemoryStore::new());
    let runner = make_runner(source, store.clone(), &["emergency", "pediatrics"]);
    runner.initialize().await.unwrap();

    let result = runner.execute_scraping_job().await.unwrap();

    assert!(result.success);
    assert_eq!(result.scrapes_succeeded, 1);
    assert_eq!(result.records_inserted, 1);
    assert!(result.error.as_deref().unwrap_or("").contains("emergency"));
}

#[tokio::test]
async fn test_failed_job_is_recorded_with_zero_inserts() {
    let store = Arc::new(InMemoryStore::new());
    let runner = make_runner(
        Arc::new(ScriptedSource::new("Wartezeit: 9999 min")),
        store,
        &["emergency"],
    );
    runner.initialize().await.unwrap();

    let result = runner.execute_scraping_job().await.unwrap();
    assert!(!result.success);
    assert_eq!(result.records_inserted, 0);
    assert!(result.error.as_deref().unwrap_or("").contains("Could not extract wait time"));

    let history = runner.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].job_id, result.job_id);
}

#[tokio::test]
async fn test_overlapping_run_is_refused() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_delay(Duration::from_millis(200)));
    let store = Arc::new(InMemoryStore::new());
    let runner = Arc::new(make_runner(source.clone(), store, &["emergency"]));
    runner.initialize().await.unwrap();

    let background = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.execute_scraping_job().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runner.is_running());

    let refused = runner.execute_scraping_job().await;
    assert!(matches!(refused, Err(JobError::AlreadyRunning)));

    let finished = background.await.unwrap().unwrap();
    assert!(finished.success);
    assert!(!runner.is_running());
    assert_eq!(source.captures(), 1);
}

#[tokio::test]
async fn test_statistics_over_history() {
    let source = Arc::new(
        ScriptedSource::new(common::PAGE_TEXT)
            .with_script(vec![Ok("Notaufnahme geöffnet".to_string())]),
    );
    let runner = make_runner(source, Arc::new(InMemoryStore::new()), &["emergency"])
        .with_history_capacity(2);
    runner.initialize().await.unwrap();

    for _ in 0..3 {
        runner.execute_scraping_job().await.unwrap();
    }

    let stats = runner.statistics();
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.successful_runs, 2);
    assert_eq!(stats.total_records_inserted, 2);
    assert!((stats.success_rate - 1.0).abs() < f64::EPSILON);
    assert!(stats.last_run.is_some());
}

#[tokio::test]
async fn test_health_check_combines_storage_and_browser() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT));
    let store = Arc::new(InMemoryStore::new());
    let runner = make_runner(source.clone(), store.clone(), &["emergency"]);

    let report = runner.perform_health_check().await;
    assert!(!report.healthy);
    assert!(!report.storage.connected);

    runner.initialize().await.unwrap();
    assert!(runner.perform_health_check().await.healthy);

    source.probe_fails.store(true, Ordering::SeqCst);
    let report = runner.perform_health_check().await;
    assert!(!report.healthy);
    assert!(report.storage.connected);
    assert!(!report.scraper_alive);
    assert!(report.scraper_error.is_some());
}

#[tokio::test]
async fn test_shutdown_waits_then_releases_resources() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_delay(Duration::from_millis(150)));
    let store = Arc::new(FlakyStore::default());
    let runner = Arc::new(make_runner(source.clone(), store.clone(), &["emergency"]));
    runner.initialize().await.unwrap();

    let background = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.execute_scraping_job().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    runner.shutdown().await;

    // the in-flight run finished before resources were released
    let finished = background.await.unwrap().unwrap();
    assert!(finished.success);
    assert_eq!(finished.records_inserted, 1);
    assert_eq!(source.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(store.disconnects.load(Ordering::SeqCst), 1);

    assert!(matches!(runner.execute_scraping_job().await, Err(JobError::ShuttingDown)));
    runner.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_gives_up_after_timeout() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_delay(Duration::from_millis(500)));
    let runner = Arc::new(
        make_runner(source.clone(), Arc::new(InMemoryStore::new()), &["emergency"])
            .with_shutdown_timeout(Duration::from_millis(100)),
    );
    runner.initialize().await.unwrap();

    let background = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.execute_scraping_job().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    runner.shutdown().await;
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(source.shutdowns.load(Ordering::SeqCst), 1);

    background.abort();
}

#[tokio::test]
async fn test_job_waits_for_health_check_page() {
    let source = Arc::new(
        ScriptedSource::new(common::PAGE_TEXT).with_probe_delay(Duration::from_millis(150)),
    );
    let runner = Arc::new(make_runner(source.clone(), Arc::new(InMemoryStore::new()), &["emergency"]));
    runner.initialize().await.unwrap();

    let health = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.perform_health_check().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let result = runner.execute_scraping_job().await.unwrap();
    assert!(result.success);
    assert!(health.await.unwrap().healthy);
    assert_eq!(source.max_open_pages.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_health_check_during_job_skips_browser() {
    let source = Arc::new(ScriptedSource::new(common::PAGE_TEXT).with_delay(Duration::from_millis(150)));
    let runner = Arc::new(make_runner(source.clone(), Arc::new(InMemoryStore::new()), &["emergency"]));
    runner.initialize().await.unwrap();

    let job = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.execute_scraping_job().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let report = runner.perform_health_check().await;
    assert!(report.healthy);
    assert!(report.scraper_alive);
    assert!(job.await.unwrap().unwrap().success);
    assert_eq!(source.max_open_pages.load(Ordering::SeqCst), 1);
}
