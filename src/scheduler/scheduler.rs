//! Cron-driven job scheduler
//!
//! Each registered job gets a loop task that sleeps until the next cron
//! firing and then spawns one run. A run that finds the job still running
//! is skipped with a warning; runs are never queued.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::schedule::CronSchedule;
use super::types::{JobHandler, JobStatus, RunOutcome, ScheduleConfig, SchedulerError};
use crate::utils::{SCHEDULER_SHUTDOWN_TIMEOUT_SECS, SHUTDOWN_POLL_INTERVAL_MS};

/// Per-job bookkeeping shared between the loop task and manual triggers
///
/// `running` outlives the job registration: a replacement under the same name
/// takes over the flag, so a run still in flight keeps blocking new ones.
#[derive(Debug, Default)]
struct JobState {
    running: Arc<AtomicBool>,
    run_count: AtomicU64,
    error_count: AtomicU64,
    last_error: Mutex<Option<String>>,
    last_run: Mutex<Option<DateTime<Utc>>>,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

struct ScheduledJob {
    schedule: CronSchedule,
    handler: JobHandler,
    state: Arc<JobState>,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ScheduledJob {
    /// Stop future firings; a run already in progress is left alone
    fn stop(&self) {
        self.stop.notify_one();
        self.task.abort();
    }

    fn status(&self, name: &str) -> JobStatus {
        JobStatus {
            name: name.to_string(),
            cron_expression: self.schedule.expression().to_string(),
            running: self.state.running.load(Ordering::SeqCst),
            run_count: self.state.run_count.load(Ordering::SeqCst),
            error_count: self.state.error_count.load(Ordering::SeqCst),
            last_error: self.state.last_error.lock().clone(),
            last_run: *self.state.last_run.lock(),
            next_run: *self.state.next_run.lock(),
        }
    }
}

pub struct Scheduler {
    jobs: DashMap<String, ScheduledJob>,
    shutting_down: AtomicBool,
    shutdown_timeout: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            shutting_down: AtomicBool::new(false),
            shutdown_timeout: Duration::from_secs(SCHEDULER_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Per-job wait ceiling used by `shutdown()`
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Register `handler` under `config.name`
    ///
    /// The expression is validated before anything is touched, so a bad
    /// expression leaves the scheduler unchanged. A job with the same name is
    /// stopped and replaced. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` for a malformed expression, `ShuttingDown` after
    /// `shutdown()` has begun.
    pub fn schedule_job(&self, config: ScheduleConfig, handler: JobHandler) -> Result<(), SchedulerError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShuttingDown);
        }
        let schedule = CronSchedule::parse(&config.cron_expression)?;

        let running = match self.jobs.remove(&config.name) {
            Some((_, previous)) => {
                previous.stop();
                info!(job = %config.name, "Replacing existing job");
                previous.state.running.clone()
            }
            None => Arc::default(),
        };

        let state = Arc::new(JobState {
            running,
            ..JobState::default()
        });
        *state.next_run.lock() = schedule.next_fire();
        let stop = Arc::new(Notify::new());

        if config.run_immediately {
            let (name, handler, state) = (config.name.clone(), handler.clone(), state.clone());
            tokio::spawn(async move {
                run_once(&name, &handler, &state).await;
            });
        }

        let task = tokio::spawn(run_loop(
            config.name.clone(),
            schedule.clone(),
            handler.clone(),
            state.clone(),
            stop.clone(),
        ));

        info!(
            job = %config.name,
            schedule = %schedule,
            next_run = ?*state.next_run.lock(),
            "Job scheduled"
        );

        self.jobs.insert(
            config.name,
            ScheduledJob {
                schedule,
                handler,
                state,
                stop,
                task,
            },
        );
        Ok(())
    }

    /// Run `name` now and wait for it to finish
    ///
    /// # Errors
    ///
    /// `JobNotFound` if no job is registered under `name`.
    pub async fn run_job_immediately(&self, name: &str) -> Result<RunOutcome, SchedulerError> {
        // clone out so no map guard is held across the await
        let (handler, state) = {
            let job = self
                .jobs
                .get(name)
                .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
            (job.handler.clone(), job.state.clone())
        };
        Ok(run_once(name, &handler, &state).await)
    }

    #[must_use]
    pub fn job_status(&self, name: &str) -> Option<JobStatus> {
        self.jobs.get(name).map(|job| job.status(name))
    }

    /// Status of every job, sorted by name
    #[must_use]
    pub fn list_jobs(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self
            .jobs
            .iter()
            .map(|entry| entry.value().status(entry.key()))
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    /// # Errors
    ///
    /// `JobNotFound` if no job is registered under `name`.
    pub fn unschedule(&self, name: &str) -> Result<(), SchedulerError> {
        let (_, job) = self
            .jobs
            .remove(name)
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        job.stop();
        info!(job = name, "Job unscheduled");
        Ok(())
    }

    /// Stop all firings and wait for running jobs
    ///
    /// Each running job gets up to the shutdown timeout to finish; after that
    /// the scheduler moves on without cancelling it.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("Scheduler shutdown already requested");
        }
        info!(jobs = self.jobs.len(), "Shutting down scheduler");

        let names: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        let mut stopped = Vec::with_capacity(names.len());
        for name in names {
            if let Some((name, job)) = self.jobs.remove(&name) {
                job.stop();
                stopped.push((name, job.state));
            }
        }

        for (name, state) in stopped {
            let deadline = Instant::now() + self.shutdown_timeout;
            while state.running.load(Ordering::SeqCst) && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(SHUTDOWN_POLL_INTERVAL_MS)).await;
            }
            if state.running.load(Ordering::SeqCst) {
                warn!(
                    job = %name,
                    "Job still running after {}s, not waiting further",
                    self.shutdown_timeout.as_secs()
                );
            }
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.value().stop();
        }
    }
}

async fn run_loop(
    name: String,
    schedule: CronSchedule,
    handler: JobHandler,
    state: Arc<JobState>,
    stop: Arc<Notify>,
) {
    let mut after = Utc::now();
    loop {
        let Some(next) = schedule.next_after(after) else {
            warn!(job = %name, "Schedule has no future firings, stopping");
            break;
        };
        *state.next_run.lock() = Some(next);
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            () = stop.notified() => break,
            () = tokio::time::sleep(wait) => {}
        }

        after = resume_after(next, Utc::now());

        let (name, handler, state) = (name.clone(), handler.clone(), state.clone());
        tokio::spawn(async move {
            run_once(&name, &handler, &state).await;
        });
    }
    debug!(job = %name, "Scheduler loop exited");
}

/// Where to look for the next firing after `fired`
///
/// Never earlier than `fired`, so a wall clock lagging the timer cannot
/// yield the same instant twice; missed firings are not replayed.
fn resume_after(fired: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    fired.max(now)
}

/// One run with bookkeeping; skipped when the job is already running
async fn run_once(name: &str, handler: &JobHandler, state: &JobState) -> RunOutcome {
    if state
        .running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!(job = name, "Job is already running, skipping this run");
        return RunOutcome::Skipped;
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("scheduled_job", job = name, run_id = %run_id);
    let started = Instant::now();

    // a panicking handler counts as a failed run
    let result = AssertUnwindSafe(async { handler().await }.instrument(span.clone()))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(anyhow::anyhow!("job panicked: {}", panic_message(payload.as_ref()))));

    state.run_count.fetch_add(1, Ordering::SeqCst);
    *state.last_run.lock() = Some(Utc::now());
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let outcome = span.in_scope(|| match result {
        Ok(()) => {
            info!(elapsed_ms, "Job run completed");
            RunOutcome::Completed
        }
        Err(e) => {
            let message = format!("{e:#}");
            state.error_count.fetch_add(1, Ordering::SeqCst);
            *state.last_error.lock() = Some(message.clone());
            error!(elapsed_ms, "Job run failed: {message}");
            RunOutcome::Failed(message)
        }
    });

    state.running.store(false, Ordering::SeqCst);
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
