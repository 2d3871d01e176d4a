//! Phase two: turn captured text into numbers
//!
//! For each field, the priority selectors' text is tried first, in strategy
//! order. If none yields a value, every captured line that mentions one of the
//! field's keywords is tried. Each candidate is range-checked; out-of-range
//! values are dropped and the search goes on.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::capture::RawFieldCapture;
use super::patterns::{DURATION_PHRASES, FRESHNESS_PHRASES, patterns_for};
use super::selectors::{Locator, MetricField};
use crate::model::ParsedMetric;
use crate::scrape_engine::{ScrapeError, ScrapeResult};

/// Message of the extraction failure when no valid wait time exists
pub const WAIT_TIME_NOT_FOUND: &str = "Could not extract wait time from page";

/// Remove phrases that would be misread as this field
fn prepare(field: MetricField, text: &str) -> Cow<'_, str> {
    match field {
        MetricField::WaitTime => FRESHNESS_PHRASES.replace_all(text, " "),
        MetricField::TotalPatients | MetricField::AmbulancePatients | MetricField::EmergencyCases => {
            let without_freshness = FRESHNESS_PHRASES.replace_all(text, " ");
            Cow::Owned(DURATION_PHRASES.replace_all(&without_freshness, " ").into_owned())
        }
        MetricField::LastUpdate => Cow::Borrowed(text),
    }
}

/// Minutes between an RFC 3339 timestamp and `now`
fn delay_from_timestamp(text: &str, now: DateTime<Utc>) -> Option<u32> {
    let stamp = DateTime::parse_from_rfc3339(text.trim()).ok()?;
    let minutes = now.signed_duration_since(stamp.with_timezone(&Utc)).num_minutes();
    u32::try_from(minutes).ok()
}

/// First in-range value `field`'s patterns read from `text`
fn first_valid(field: MetricField, text: &str, now: DateTime<Utc>) -> Option<u32> {
    let range = field.sane_range();

    if field == MetricField::LastUpdate
        && let Some(minutes) = delay_from_timestamp(text, now)
    {
        if range.contains(&minutes) {
            return Some(minutes);
        }
        debug!(field = %field, value = minutes, "rejected out-of-range timestamp delay");
    }

    let prepared = prepare(field, text);
    for pattern in patterns_for(field) {
        for value in pattern.candidates(&prepared) {
            if range.contains(&value) {
                return Some(value);
            }
            debug!(field = %field, value, "rejected out-of-range candidate");
        }
    }
    None
}

fn belongs_elsewhere(field: MetricField, lower: &str) -> bool {
    field.exclusions().iter().any(|k| lower.contains(k))
}

fn mentions_field(field: MetricField, line: &str) -> bool {
    let lower = line.to_lowercase();
    field.keywords().iter().any(|k| lower.contains(k)) && !belongs_elsewhere(field, &lower)
}

/// Drop lines of a label match that name another field
///
/// A label like "Patienten" also matches "Patienten per Rettungsdienst".
fn without_foreign_lines(field: MetricField, text: &str) -> Cow<'_, str> {
    if !text.lines().any(|line| belongs_elsewhere(field, &line.to_lowercase())) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.lines()
            .filter(|line| !belongs_elsewhere(field, &line.to_lowercase()))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Parse one field out of a capture
#[must_use]
pub fn parse_field(field: MetricField, capture: &RawFieldCapture, now: DateTime<Utc>) -> Option<u32> {
    for strategy in field.strategies() {
        let Some(text) = capture.get(field, strategy) else {
            continue;
        };
        let text = match strategy.locator {
            Locator::TextContains(_) => without_foreign_lines(field, text),
            Locator::Css(_) => Cow::Borrowed(text),
        };
        if let Some(value) = first_valid(field, &text, now) {
            trace!(field = %field, strategy = %strategy, value, "parsed from selector");
            return Some(value);
        }
    }

    let fallback_lines = capture
        .selector_texts()
        .chain(std::iter::once(capture.page_text.as_str()))
        .flat_map(str::lines)
        .filter(|line| mentions_field(field, line));

    for line in fallback_lines {
        if let Some(value) = first_valid(field, line, now) {
            trace!(field = %field, value, "parsed from keyword fallback");
            return Some(value);
        }
    }
    None
}

/// Wait time from free text, in minutes (0-480)
#[must_use]
pub fn extract_wait_time(text: &str) -> Option<u32> {
    first_valid(MetricField::WaitTime, text, Utc::now())
}

/// Patient count from free text (0-200)
#[must_use]
pub fn extract_patient_count(text: &str) -> Option<u32> {
    first_valid(MetricField::TotalPatients, text, Utc::now())
}

/// Minutes since the site's last update (0-1440)
#[must_use]
pub fn extract_update_delay(text: &str, now: DateTime<Utc>) -> Option<u32> {
    first_valid(MetricField::LastUpdate, text, now)
}

/// Build a metric from a capture, as of `now`
///
/// # Errors
///
/// `Extraction` when no valid wait time was found.
pub fn extract_metric_at(capture: &RawFieldCapture, now: DateTime<Utc>) -> ScrapeResult<ParsedMetric> {
    let wait_time_minutes = parse_field(MetricField::WaitTime, capture, now)
        .ok_or_else(|| ScrapeError::Extraction(WAIT_TIME_NOT_FOUND.to_string()))?;

    let metric = ParsedMetric {
        wait_time_minutes,
        total_patients: parse_field(MetricField::TotalPatients, capture, now),
        ambulance_patients: parse_field(MetricField::AmbulancePatients, capture, now),
        emergency_cases: parse_field(MetricField::EmergencyCases, capture, now),
        update_delay_minutes: parse_field(MetricField::LastUpdate, capture, now),
    };
    metric.validate()?;
    Ok(metric)
}

/// Build a metric from a capture taken just now
///
/// # Errors
///
/// `Extraction` when no valid wait time was found.
pub fn extract_metric(capture: &RawFieldCapture) -> ScrapeResult<ParsedMetric> {
    extract_metric_at(capture, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_extractor::selectors::SelectorStrategy;
    use chrono::TimeZone;

    #[test]
    fn test_selector_text_beats_fallback() {
        let mut capture = RawFieldCapture::from_page_text("Wartezeit: 90 min");
        capture.insert(
            MetricField::WaitTime,
            &SelectorStrategy::css_attr("[data-wait-time]", "data-wait-time"),
            "35",
        );
        assert_eq!(parse_field(MetricField::WaitTime, &capture, Utc::now()), Some(35));
    }

    #[test]
    fn test_out_of_range_selector_falls_through_to_next_candidate() {
        let mut capture = RawFieldCapture::from_page_text("Wartezeit: 50 min");
        capture.insert(
            MetricField::WaitTime,
            &SelectorStrategy::css(".wartezeit"),
            "Wartezeit: 600 min",
        );
        assert_eq!(parse_field(MetricField::WaitTime, &capture, Utc::now()), Some(50));
    }

    #[test]
    fn test_freshness_is_never_read_as_wait_time() {
        assert_eq!(extract_wait_time("Wartezeit: 9999 min, aktualisiert vor 3 min"), None);
    }

    #[test]
    fn test_counts_ignore_durations() {
        assert_eq!(extract_patient_count("Patienten warten ca. 45 min"), None);
        assert_eq!(extract_patient_count("Patienten: 250"), None);
    }

    #[test]
    fn test_timestamp_attribute_gives_delay() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(extract_update_delay("2024-03-01T11:57:00Z", now), Some(3));
        assert_eq!(extract_update_delay("2024-03-01T13:00:00+01:00", now), Some(0));
        // in the future
        assert_eq!(extract_update_delay("2024-03-01T12:30:00Z", now), None);
    }

    #[test]
    fn test_total_patients_skip_ambulance_lines() {
        let capture = RawFieldCapture::from_page_text(
            "Wartezeit: 20 min\nPatienten per Rettungsdienst: 4\nPatienten gesamt: 17",
        );
        let metric = extract_metric(&capture).expect("wait time present");
        assert_eq!(metric.total_patients, Some(17));
        assert_eq!(metric.ambulance_patients, Some(4));
    }

    #[test]
    fn test_label_match_for_another_field_is_skipped() {
        let mut capture = RawFieldCapture::from_page_text("Wartezeit: 20 min");
        capture.insert(
            MetricField::TotalPatients,
            &SelectorStrategy::text("Patienten"),
            "Patienten per Rettungsdienst: 4",
        );
        assert_eq!(parse_field(MetricField::TotalPatients, &capture, Utc::now()), None);

        capture.insert(
            MetricField::TotalPatients,
            &SelectorStrategy::text("Patients"),
            "Patients by ambulance: 4\nPatients total: 17",
        );
        assert_eq!(parse_field(MetricField::TotalPatients, &capture, Utc::now()), Some(17));
    }
}
