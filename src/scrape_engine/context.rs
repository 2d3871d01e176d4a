//! Per-scrape context and result types

use serde::{Deserialize, Serialize};
use tracing::Span;

use super::errors::ScrapeError;
use crate::model::{HospitalMetricRecord, ScrapeTarget};
use crate::retry::RetryFilter;

/// Carried explicitly through one `scrape()` call
///
/// The span is entered by the orchestrator; everything logged underneath
/// carries the correlation id.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub correlation_id: String,
    pub target: ScrapeTarget,
    pub span: Span,
}

impl ScrapeContext {
    #[must_use]
    pub fn new(target: ScrapeTarget) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "scrape",
            correlation_id = %correlation_id,
            url = %target.url,
            department = %target.department,
        );
        Self {
            correlation_id,
            target,
            span,
        }
    }
}

/// What to do when a page loaded but the fields could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRetryPolicy {
    /// Fail the scrape on the first extraction or validation error
    #[default]
    FailFast,
    /// Treat extraction errors like transient faults and spend the retry budget
    RetryWithBudget,
}

impl ExtractionRetryPolicy {
    /// Whether `err` earns another attempt
    ///
    /// Extraction and validation errors follow the policy; everything else
    /// goes through the signature filter.
    #[must_use]
    pub fn should_retry(self, err: &ScrapeError, filter: &RetryFilter) -> bool {
        if err.is_extraction() {
            return self == Self::RetryWithBudget;
        }
        filter.matches(err.kind_name(), &err.to_string())
    }
}

/// Timing breakdown of one scrape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTimings {
    /// Navigation plus readiness wait of the final attempt
    pub page_load_ms: u64,
    /// Capture plus parse of the final attempt
    pub extraction_ms: u64,
    /// Wall time across all attempts and backoff
    pub total_ms: u64,
    pub attempts: u32,
    pub retries: u32,
}

/// Outcome of `Scraper::scrape`
///
/// Never an error at the type level: failures are described in `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingResult {
    pub success: bool,
    pub correlation_id: String,
    pub target: ScrapeTarget,
    pub record: Option<HospitalMetricRecord>,
    pub error: Option<String>,
    /// Stable error kind name, e.g. `TimeoutError`
    pub error_kind: Option<String>,
    pub metrics: ScrapeTimings,
    pub quality_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_stops_on_extraction_errors_only() {
        let filter = RetryFilter::default_signatures();
        let extraction = ScrapeError::Extraction("Could not extract wait time from page".into());
        let timeout = ScrapeError::timeout("Page navigation", 30_000);

        assert!(!ExtractionRetryPolicy::FailFast.should_retry(&extraction, &filter));
        assert!(ExtractionRetryPolicy::RetryWithBudget.should_retry(&extraction, &filter));
        assert!(ExtractionRetryPolicy::FailFast.should_retry(&timeout, &filter));
        assert!(!ExtractionRetryPolicy::FailFast.should_retry(&ScrapeError::NotInitialized, &filter));
    }

    #[test]
    fn test_contexts_get_distinct_correlation_ids() {
        let target = ScrapeTarget::new("https://example.org/er", "emergency");
        let a = ScrapeContext::new(target.clone());
        let b = ScrapeContext::new(target);
        assert_ne!(a.correlation_id, b.correlation_id);
    }
}
