use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StorageResult;
use crate::model::HospitalMetricRecord;

/// Result of a storage health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageHealth {
    pub connected: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Filter for `MetricStore::query`
///
/// Results are ordered newest first. `total` in the result counts all
/// matching rows, ignoring `limit` and `offset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricQuery {
    pub department: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl MetricQuery {
    #[must_use]
    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether `record` passes the department and time filters
    #[must_use]
    pub fn matches(&self, record: &HospitalMetricRecord) -> bool {
        if let Some(department) = &self.department
            && &record.department != department
        {
            return false;
        }
        if let Some(since) = self.since
            && record.timestamp < since
        {
            return false;
        }
        if let Some(until) = self.until
            && record.timestamp > until
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub data: Vec<HospitalMetricRecord>,
    pub total: usize,
}

/// Persistence collaborator for scraped records
///
/// The job runner only talks to this trait and never assumes a backend.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn connect(&self) -> StorageResult<()>;

    async fn disconnect(&self) -> StorageResult<()>;

    async fn is_connected(&self) -> bool;

    /// Never fails; problems are reported in the returned value
    async fn health_check(&self) -> StorageHealth;

    /// Persist `record` and return its id
    async fn insert(&self, record: &HospitalMetricRecord) -> StorageResult<String>;

    async fn query(&self, filter: &MetricQuery) -> StorageResult<QueryResult>;
}
