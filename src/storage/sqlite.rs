//! SQLite-backed record store
//!
//! One pooled connection, one table. Timestamps are stored as fixed-width
//! RFC 3339 strings so that text ordering equals time ordering.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::errors::{StorageError, StorageResult};
use super::traits::{MetricQuery, MetricStore, QueryResult, StorageHealth};
use crate::model::{HospitalMetricRecord, ParsedMetric, RecordMetadata};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS hospital_metrics (
    id TEXT PRIMARY KEY NOT NULL,
    timestamp TEXT NOT NULL,
    department TEXT NOT NULL,
    wait_time_minutes INTEGER NOT NULL,
    total_patients INTEGER,
    ambulance_patients INTEGER,
    emergency_cases INTEGER,
    update_delay_minutes INTEGER,
    scraping_success INTEGER NOT NULL,
    source_url TEXT NOT NULL,
    metadata TEXT NOT NULL
)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_hospital_metrics_department_timestamp
    ON hospital_metrics (department, timestamp)";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, department, wait_time_minutes, total_patients, \
    ambulance_patients, emergency_cases, update_delay_minutes, scraping_success, source_url, metadata \
    FROM hospital_metrics";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct SqliteStore {
    url: String,
    pool: Mutex<Option<SqlitePool>>,
    last_error: Mutex<Option<String>>,
}

impl SqliteStore {
    /// Store for `url`, e.g. `sqlite://metrics.db` or `sqlite::memory:`
    ///
    /// Nothing is opened until `connect()`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn pool(&self) -> StorageResult<SqlitePool> {
        self.pool.lock().clone().ok_or(StorageError::NotConnected)
    }

    fn remember<T>(&self, result: StorageResult<T>) -> StorageResult<T> {
        if let Err(e) = &result {
            *self.last_error.lock() = Some(e.to_string());
        }
        result
    }

    async fn open(&self) -> StorageResult<SqlitePool> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true);

        // a single connection that never idles out keeps `:memory:` alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(CONNECT_TIMEOUT)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_INDEX).execute(&pool).await?;
        Ok(pool)
    }

    async fn insert_row(&self, record: &HospitalMetricRecord) -> StorageResult<String> {
        let pool = self.pool()?;
        let metadata = serde_json::to_string(&record.metadata)?;
        let metric = &record.metric;

        sqlx::query(
            "INSERT INTO hospital_metrics (id, timestamp, department, wait_time_minutes, \
             total_patients, ambulance_patients, emergency_cases, update_delay_minutes, \
             scraping_success, source_url, metadata) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(format_timestamp(record.timestamp))
        .bind(&record.department)
        .bind(i64::from(metric.wait_time_minutes))
        .bind(metric.total_patients.map(i64::from))
        .bind(metric.ambulance_patients.map(i64::from))
        .bind(metric.emergency_cases.map(i64::from))
        .bind(metric.update_delay_minutes.map(i64::from))
        .bind(record.scraping_success)
        .bind(&record.source_url)
        .bind(metadata)
        .execute(&pool)
        .await?;

        debug!("Inserted record {} for {}", record.id, record.department);
        Ok(record.id.clone())
    }

    async fn query_rows(&self, filter: &MetricQuery) -> StorageResult<QueryResult> {
        let pool = self.pool()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM hospital_metrics");
        push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(&pool).await?.try_get(0)?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        push_filters(&mut select, filter);
        select.push(" ORDER BY timestamp DESC, rowid DESC LIMIT ");
        select.push_bind(filter.limit.map_or(-1, |l| l as i64));
        select.push(" OFFSET ");
        select.push_bind(filter.offset as i64);

        let rows = select.build().fetch_all(&pool).await?;
        let data = rows.iter().map(record_from_row).collect::<StorageResult<Vec<_>>>()?;

        Ok(QueryResult {
            data,
            total: total.max(0) as usize,
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MetricQuery) {
    let mut separator = " WHERE ";
    if let Some(department) = &filter.department {
        builder.push(separator).push("department = ").push_bind(department.clone());
        separator = " AND ";
    }
    if let Some(since) = filter.since {
        builder.push(separator).push("timestamp >= ").push_bind(format_timestamp(since));
        separator = " AND ";
    }
    if let Some(until) = filter.until {
        builder.push(separator).push("timestamp <= ").push_bind(format_timestamp(until));
    }
}

fn optional_u32(row: &SqliteRow, column: &str) -> StorageResult<Option<u32>> {
    let value: Option<i64> = row.try_get(column)?;
    Ok(value.and_then(|v| u32::try_from(v).ok()))
}

fn record_from_row(row: &SqliteRow) -> StorageResult<HospitalMetricRecord> {
    let id: String = row.try_get("id")?;
    let corrupt = |message: String| StorageError::CorruptRecord {
        id: id.clone(),
        message,
    };

    let timestamp: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| corrupt(format!("timestamp: {e}")))?
        .with_timezone(&Utc);

    let wait: i64 = row.try_get("wait_time_minutes")?;
    let wait_time_minutes =
        u32::try_from(wait).map_err(|_| corrupt(format!("wait time {wait} out of range")))?;

    let metadata: String = row.try_get("metadata")?;
    let metadata: RecordMetadata =
        serde_json::from_str(&metadata).map_err(|e| corrupt(format!("metadata: {e}")))?;

    Ok(HospitalMetricRecord {
        timestamp,
        department: row.try_get("department")?,
        metric: ParsedMetric {
            wait_time_minutes,
            total_patients: optional_u32(row, "total_patients")?,
            ambulance_patients: optional_u32(row, "ambulance_patients")?,
            emergency_cases: optional_u32(row, "emergency_cases")?,
            update_delay_minutes: optional_u32(row, "update_delay_minutes")?,
        },
        scraping_success: row.try_get("scraping_success")?,
        source_url: row.try_get("source_url")?,
        metadata,
        id,
    })
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn connect(&self) -> StorageResult<()> {
        if self.pool.lock().is_some() {
            return Ok(());
        }

        let pool = self.remember(self.open().await)?;
        *self.pool.lock() = Some(pool);
        info!("Connected to SQLite store at {}", self.url);
        Ok(())
    }

    async fn disconnect(&self) -> StorageResult<()> {
        let pool = self.pool.lock().take();
        if let Some(pool) = pool {
            pool.close().await;
            info!("Disconnected from SQLite store at {}", self.url);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.pool.lock().as_ref().is_some_and(|p| !p.is_closed())
    }

    async fn health_check(&self) -> StorageHealth {
        let started = Instant::now();
        let probe = match self.pool() {
            Ok(pool) => sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map(|_| ())
                .map_err(StorageError::from),
            Err(e) => Err(e),
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        match self.remember(probe) {
            Ok(()) => StorageHealth {
                connected: true,
                response_time_ms,
                last_error: None,
            },
            Err(e) => {
                warn!("SQLite health check failed: {e}");
                StorageHealth {
                    connected: false,
                    response_time_ms,
                    last_error: Some(e.to_string()),
                }
            }
        }
    }

    async fn insert(&self, record: &HospitalMetricRecord) -> StorageResult<String> {
        let result = self.insert_row(record).await;
        self.remember(result)
    }

    async fn query(&self, filter: &MetricQuery) -> StorageResult<QueryResult> {
        let result = self.query_rows(filter).await;
        self.remember(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_as_text() {
        let early = DateTime::parse_from_rfc3339("2024-03-01T09:05:00Z").unwrap().with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2024-03-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
        assert!(format_timestamp(early) < format_timestamp(late));
        assert_eq!(format_timestamp(early), "2024-03-01T09:05:00.000000Z");
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let store = SqliteStore::new("sqlite::memory:");
        assert!(!store.is_connected().await);
        assert!(matches!(
            store.query(&MetricQuery::default()).await,
            Err(StorageError::NotConnected)
        ));
        let health = store.health_check().await;
        assert!(!health.connected);
        assert_eq!(health.last_error.as_deref(), Some("Storage is not connected"));
    }
}
