//! Process-local record store

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;

use super::errors::{StorageError, StorageResult};
use super::traits::{MetricQuery, MetricStore, QueryResult, StorageHealth};
use crate::model::HospitalMetricRecord;

/// Records kept in insertion order behind a lock
///
/// Used when no database URL is configured, and in tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<HospitalMetricRecord>>,
    connected: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<HospitalMetricRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl MetricStore for InMemoryStore {
    async fn connect(&self) -> StorageResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        debug!("In-memory store connected");
        Ok(())
    }

    async fn disconnect(&self) -> StorageResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn health_check(&self) -> StorageHealth {
        let started = Instant::now();
        let connected = self.is_connected().await;
        StorageHealth {
            connected,
            response_time_ms: started.elapsed().as_millis() as u64,
            last_error: (!connected).then(|| StorageError::NotConnected.to_string()),
        }
    }

    async fn insert(&self, record: &HospitalMetricRecord) -> StorageResult<String> {
        if !self.is_connected().await {
            return Err(StorageError::NotConnected);
        }
        let mut records = self.records.write();
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(StorageError::Query(format!("duplicate record id {}", record.id)));
        }
        records.push(record.clone());
        Ok(record.id.clone())
    }

    async fn query(&self, filter: &MetricQuery) -> StorageResult<QueryResult> {
        if !self.is_connected().await {
            return Err(StorageError::NotConnected);
        }

        let records = self.records.read();
        let mut matching: Vec<&HospitalMetricRecord> =
            records.iter().filter(|r| filter.matches(r)).collect();
        // newest first, insertion order breaks ties
        matching.reverse();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(QueryResult { data, total })
    }
}
