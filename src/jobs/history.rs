use std::collections::VecDeque;

use super::types::{JobExecutionResult, JobStatistics};

/// Bounded FIFO of recent job results
#[derive(Debug, Clone)]
pub struct ExecutionHistory {
    capacity: usize,
    entries: VecDeque<JobExecutionResult>,
}

impl ExecutionHistory {
    /// A capacity of zero is raised to one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `result`, evicting the oldest entry when full
    pub fn push(&mut self, result: JobExecutionResult) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&JobExecutionResult> {
        self.entries.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &JobExecutionResult> {
        self.entries.iter()
    }

    #[must_use]
    pub fn statistics(&self) -> JobStatistics {
        let total_runs = self.entries.len();
        if total_runs == 0 {
            return JobStatistics::default();
        }

        let successful_runs = self.entries.iter().filter(|r| r.success).count();
        let total_duration: u64 = self.entries.iter().map(|r| r.duration_ms).sum();
        let total_records_inserted = self
            .entries
            .iter()
            .map(|r| u64::from(r.records_inserted))
            .sum();

        JobStatistics {
            total_runs,
            successful_runs,
            failed_runs: total_runs - successful_runs,
            success_rate: successful_runs as f64 / total_runs as f64,
            average_duration_ms: total_duration as f64 / total_runs as f64,
            total_records_inserted,
            last_run: self.latest().map(|r| r.end_time),
        }
    }
}
