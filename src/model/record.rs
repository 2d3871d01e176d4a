//! Persisted hospital metric record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::ParsedMetric;
use super::target::ScrapeTarget;

/// Provenance attached to every stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub scraper_id: String,
    pub version: String,
    pub processing_time_ms: u64,
    pub browser_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One successful scrape, as handed to the storage collaborator
///
/// Owned by the store once inserted; nothing in this crate updates a record
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalMetricRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub department: String,
    #[serde(flatten)]
    pub metric: ParsedMetric,
    pub scraping_success: bool,
    pub source_url: String,
    pub metadata: RecordMetadata,
}

impl HospitalMetricRecord {
    /// Build a record for a successful scrape, stamped with a fresh id and the
    /// current time
    #[must_use]
    pub fn new(target: &ScrapeTarget, metric: ParsedMetric, metadata: RecordMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            department: target.department.clone(),
            metric,
            scraping_success: true,
            source_url: target.url.clone(),
            metadata,
        }
    }
}
