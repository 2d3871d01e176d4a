//! Cron scheduling for recurring jobs
//!
//! Five-field cron expressions, validated at registration, with per-job run
//! bookkeeping and no overlapping runs.

pub mod schedule;
#[allow(clippy::module_inception)]
pub mod scheduler;
pub mod types;

pub use schedule::CronSchedule;
pub use scheduler::Scheduler;
pub use types::{
    JobHandler, JobStatus, RunOutcome, ScheduleConfig, SchedulerError, job_handler,
};
