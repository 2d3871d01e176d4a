//! Scrape engine
//!
//! Drives a single target from page load to a validated
//! `HospitalMetricRecord`, with retry and structured failure results.

pub mod browser_source;
pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod page_timeout;
pub mod source;

pub use browser_source::BrowserCapture;
pub use context::{ExtractionRetryPolicy, ScrapeContext, ScrapeTimings, ScrapingResult};
pub use errors::{ScrapeError, ScrapeResult};
pub use orchestrator::{Scraper, ScraperOptions};
pub use page_timeout::with_page_timeout;
pub use source::{CaptureSource, PageCapture, SourceInfo};
