//! Scheduler registration, bookkeeping and shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use erwait::scheduler::{RunOutcome, ScheduleConfig, Scheduler, SchedulerError, job_handler};

fn counting_handler(counter: Arc<AtomicU32>) -> erwait::scheduler::JobHandler {
    job_handler(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_invalid_expression_leaves_no_state() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));

    for expression in ["not a cron", "* * * *", "61 * * * *", "* * * * * *"] {
        let err = scheduler
            .schedule_job(
                ScheduleConfig::new("scrape", expression).run_immediately(true),
                counting_handler(counter.clone()),
            )
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }), "{expression}");
    }

    assert!(scheduler.list_jobs().is_empty());
    assert!(scheduler.job_status("scrape").is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_replacement_keeps_existing_job() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));

    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "*/10 * * * *"), counting_handler(counter.clone()))
        .unwrap();
    assert!(
        scheduler
            .schedule_job(ScheduleConfig::new("scrape", "bogus"), counting_handler(counter))
            .is_err()
    );

    let status = scheduler.job_status("scrape").expect("job still registered");
    assert_eq!(status.cron_expression, "*/10 * * * *");
}

#[tokio::test]
async fn test_same_name_leaves_one_job() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));

    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "*/10 * * * *"), counting_handler(counter.clone()))
        .unwrap();
    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 6 * * 1-5"), counting_handler(counter.clone()))
        .unwrap();
    scheduler
        .schedule_job(ScheduleConfig::new("health", "*/5 * * * *"), counting_handler(counter))
        .unwrap();

    let jobs = scheduler.list_jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].name, "health");
    assert_eq!(jobs[1].name, "scrape");
    assert_eq!(jobs[1].cron_expression, "0 6 * * 1-5");
    assert!(jobs[1].next_run.is_some());
}

#[tokio::test]
async fn test_run_immediately_on_registration() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));

    scheduler
        .schedule_job(
            ScheduleConfig::new("scrape", "0 0 1 1 *").run_immediately(true),
            counting_handler(counter.clone()),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.job_status("scrape").unwrap().run_count, 1);
}

#[tokio::test]
async fn test_manual_run_records_errors() {
    let scheduler = Scheduler::new();
    scheduler
        .schedule_job(
            ScheduleConfig::new("health", "*/5 * * * *"),
            job_handler(|| async { Err::<(), _>(anyhow::anyhow!("storage unreachable")) }),
        )
        .unwrap();

    let outcome = scheduler.run_job_immediately("health").await.unwrap();
    assert_eq!(outcome, RunOutcome::Failed("storage unreachable".to_string()));

    let status = scheduler.job_status("health").unwrap();
    assert_eq!(status.run_count, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.last_error.as_deref(), Some("storage unreachable"));
    assert!(status.last_run.is_some());
    assert!(!status.running);
}

#[tokio::test]
async fn test_overlapping_manual_run_is_skipped() {
    let scheduler = Arc::new(Scheduler::new());
    let counter = Arc::new(AtomicU32::new(0));
    let handler = {
        let counter = counter.clone();
        job_handler(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            }
        })
    };
    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 0 1 1 *"), handler)
        .unwrap();

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_job_immediately("scrape").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.job_status("scrape").unwrap().running);

    let second = scheduler.run_job_immediately("scrape").await.unwrap();
    assert_eq!(second, RunOutcome::Skipped);

    assert_eq!(first.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.job_status("scrape").unwrap().run_count, 1);
}

#[tokio::test]
async fn test_unknown_job() {
    let scheduler = Scheduler::new();
    assert_eq!(
        scheduler.run_job_immediately("missing").await.unwrap_err(),
        SchedulerError::JobNotFound("missing".into())
    );
    assert!(scheduler.unschedule("missing").is_err());
}

#[tokio::test]
async fn test_shutdown_waits_for_running_job() {
    let scheduler = Arc::new(Scheduler::new().with_shutdown_timeout(Duration::from_secs(5)));
    let finished = Arc::new(AtomicU32::new(0));
    let handler = {
        let finished = finished.clone();
        job_handler(move || {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };
    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 0 1 1 *").run_immediately(true), handler)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    scheduler.shutdown().await;

    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert!(scheduler.list_jobs().is_empty());
    assert_eq!(
        scheduler
            .schedule_job(ScheduleConfig::new("late", "* * * * *"), counting_handler(finished))
            .unwrap_err(),
        SchedulerError::ShuttingDown
    );
}

#[tokio::test]
async fn test_panicking_run_does_not_block_later_runs() {
    let scheduler = Scheduler::new();
    let calls = Arc::new(AtomicU32::new(0));
    let handler = {
        let calls = calls.clone();
        job_handler(move || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("widget markup changed");
                }
                Ok(())
            }
        })
    };
    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 0 1 1 *").run_immediately(true), handler)
        .unwrap();

    for _ in 0..50 {
        if scheduler.job_status("scrape").unwrap().run_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = scheduler.job_status("scrape").unwrap();
    assert_eq!(status.run_count, 1);
    assert_eq!(status.error_count, 1);
    assert!(!status.running);
    assert!(status.last_error.unwrap().contains("widget markup changed"));

    let outcome = scheduler.run_job_immediately("scrape").await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

fn exploding_check() -> anyhow::Result<()> {
    panic!("storage check exploded")
}

#[tokio::test]
async fn test_manual_panic_is_reported_as_failure() {
    let scheduler = Scheduler::new();
    scheduler
        .schedule_job(
            ScheduleConfig::new("health", "0 0 1 1 *"),
            job_handler(|| async { exploding_check() }),
        )
        .unwrap();

    let outcome = scheduler.run_job_immediately("health").await.unwrap();
    assert_eq!(outcome, RunOutcome::Failed("job panicked: storage check exploded".to_string()));
    assert!(!scheduler.job_status("health").unwrap().running);
}

#[tokio::test]
async fn test_replacing_a_running_job_does_not_overlap() {
    let scheduler = Arc::new(Scheduler::new().with_shutdown_timeout(Duration::from_secs(5)));
    let active = Arc::new(AtomicU32::new(0));
    let max_active = Arc::new(AtomicU32::new(0));
    let finished = Arc::new(AtomicU32::new(0));
    let slow_handler = || {
        let (active, max_active, finished) = (active.clone(), max_active.clone(), finished.clone());
        job_handler(move || {
            let (active, max_active, finished) = (active.clone(), max_active.clone(), finished.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };

    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 0 1 1 *").run_immediately(true), slow_handler())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    scheduler
        .schedule_job(ScheduleConfig::new("scrape", "0 0 2 1 *"), slow_handler())
        .unwrap();
    assert!(scheduler.job_status("scrape").unwrap().running);

    let second = scheduler.run_job_immediately("scrape").await.unwrap();
    assert_eq!(second, RunOutcome::Skipped);

    // shutdown still waits for the run started before the replacement
    scheduler.shutdown().await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}
