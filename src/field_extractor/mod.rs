//! Field extraction
//!
//! Two phases, each testable on its own:
//!
//! 1. **capture** runs every field's selector strategies against a
//!    [`DomQuery`] and collects trimmed text plus the full page text
//! 2. **parse** reads numbers out of that text with ordered regex patterns
//!    and range-checks every candidate
//!
//! A wait time is mandatory; every other field may be absent.

pub mod capture;
pub mod page_dom;
pub mod parser;
pub mod patterns;
pub mod quality;
pub mod selectors;
pub mod static_dom;

pub use capture::{DomQuery, RawFieldCapture, capture_fields};
pub use parser::{
    WAIT_TIME_NOT_FOUND, extract_metric, extract_metric_at, extract_patient_count,
    extract_update_delay, extract_wait_time, parse_field,
};
pub use quality::quality_score;
pub use selectors::{Locator, MetricField, SelectorStrategy};
pub use static_dom::StaticDocument;

use crate::model::ParsedMetric;
use crate::scrape_engine::ScrapeResult;

/// Capture then parse
///
/// # Errors
///
/// Page text could not be read, or no valid wait time was found.
pub async fn extract_from(dom: &dyn DomQuery) -> ScrapeResult<ParsedMetric> {
    let capture = capture_fields(dom).await?;
    extract_metric(&capture)
}
