//! Parsed wait-time metric
//!
//! A `ParsedMetric` is created by the field parser once a wait time has been
//! found and every optional field has passed its sanity bounds. It is never
//! mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::scrape_engine::ScrapeError;

/// Upper bound for a stored wait time (one day)
pub const MAX_WAIT_TIME_MINUTES: u32 = 1440;

/// Upper bound for a stored freshness delay (one day)
pub const MAX_UPDATE_DELAY_MINUTES: u32 = 1440;

/// Validated numbers pulled from one page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMetric {
    /// Current emergency-room wait time in minutes
    pub wait_time_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_patients: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambulance_patients: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_cases: Option<u32>,
    /// Minutes since the hospital site last refreshed its own numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_delay_minutes: Option<u32>,
}

impl ParsedMetric {
    /// Create a metric carrying only the required wait time
    #[must_use]
    pub fn with_wait_time(wait_time_minutes: u32) -> Self {
        Self {
            wait_time_minutes,
            total_patients: None,
            ambulance_patients: None,
            emergency_cases: None,
            update_delay_minutes: None,
        }
    }

    /// Check the record-level bounds before the metric is used
    ///
    /// These are looser than the parser's sanity bounds; they only guard the
    /// persisted shape.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.wait_time_minutes > MAX_WAIT_TIME_MINUTES {
            return Err(ScrapeError::Validation(format!(
                "wait time {} exceeds {MAX_WAIT_TIME_MINUTES} minutes",
                self.wait_time_minutes
            )));
        }
        if let Some(delay) = self.update_delay_minutes
            && delay > MAX_UPDATE_DELAY_MINUTES
        {
            return Err(ScrapeError::Validation(format!(
                "update delay {delay} exceeds {MAX_UPDATE_DELAY_MINUTES} minutes"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_full_day() {
        let metric = ParsedMetric::with_wait_time(MAX_WAIT_TIME_MINUTES);
        assert!(metric.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_stale_update_delay() {
        let metric = ParsedMetric {
            update_delay_minutes: Some(MAX_UPDATE_DELAY_MINUTES + 1),
            ..ParsedMetric::with_wait_time(30)
        };
        assert!(matches!(metric.validate(), Err(ScrapeError::Validation(_))));
    }

    #[test]
    fn test_absent_fields_are_not_serialized() {
        let json = serde_json::to_value(ParsedMetric::with_wait_time(12))
            .expect("metric should serialize");
        assert_eq!(json, serde_json::json!({ "waitTimeMinutes": 12 }));
    }
}
