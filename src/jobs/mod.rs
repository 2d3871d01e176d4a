//! Job execution: one scraping pass over all targets, history and health.

pub mod history;
pub mod runner;
pub mod types;

pub use history::ExecutionHistory;
pub use runner::JobRunner;
pub use types::{HealthReport, JobError, JobExecutionResult, JobStatistics};
