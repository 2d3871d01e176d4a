//! Phase one: pull raw text off the page

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::selectors::{Locator, MetricField, SelectorStrategy};
use crate::scrape_engine::ScrapeResult;

/// Read access to a rendered document
///
/// Implemented for a live `chromiumoxide::Page` and for a parsed static
/// HTML document.
#[async_trait]
pub trait DomQuery: Send + Sync {
    /// Trimmed text (or `attribute` value) of the first non-empty match
    async fn select_text(&self, css: &str, attribute: Option<&str>) -> ScrapeResult<Option<String>>;

    /// Text of the innermost element containing `label`, widened to its
    /// nearest ancestor that also holds a digit
    async fn text_containing(&self, label: &str) -> ScrapeResult<Option<String>>;

    /// Visible body text, one block per line
    async fn page_text(&self) -> ScrapeResult<String>;
}

/// Text captured for one extraction attempt
///
/// Keys come from `SelectorStrategy::key`; lookups go through the priority
/// lists, so insertion order does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFieldCapture {
    pub by_selector: HashMap<String, String>,
    pub page_text: String,
}

impl RawFieldCapture {
    /// A capture holding only page text
    pub fn from_page_text(page_text: impl Into<String>) -> Self {
        Self {
            by_selector: HashMap::new(),
            page_text: page_text.into(),
        }
    }

    pub fn insert(&mut self, field: MetricField, strategy: &SelectorStrategy, text: impl Into<String>) {
        self.by_selector.insert(strategy.key(field), text.into());
    }

    #[must_use]
    pub fn get(&self, field: MetricField, strategy: &SelectorStrategy) -> Option<&str> {
        self.by_selector.get(&strategy.key(field)).map(String::as_str)
    }

    /// Captured selector texts in field and strategy priority order
    pub fn selector_texts(&self) -> impl Iterator<Item = &str> {
        MetricField::ALL.into_iter().flat_map(move |field| {
            field
                .strategies()
                .iter()
                .filter_map(move |strategy| self.get(field, strategy))
        })
    }
}

async fn run_strategy(dom: &dyn DomQuery, strategy: &SelectorStrategy) -> ScrapeResult<Option<String>> {
    match strategy.locator {
        Locator::Css(css) => dom.select_text(css, strategy.attribute).await,
        Locator::TextContains(label) => dom.text_containing(label).await,
    }
}

/// Run every strategy of every field and grab the page text
///
/// Every strategy is tried even after one matched; the parser decides which
/// capture is usable.
///
/// # Errors
///
/// Only a failure to read the page text is fatal. A failing strategy is
/// logged and skipped.
pub async fn capture_fields(dom: &dyn DomQuery) -> ScrapeResult<RawFieldCapture> {
    let mut capture = RawFieldCapture::default();

    for field in MetricField::ALL {
        for strategy in field.strategies() {
            match run_strategy(dom, strategy).await {
                Ok(Some(text)) if !text.is_empty() => {
                    trace!(field = %field, strategy = %strategy, "captured: {text}");
                    capture.insert(field, strategy, text);
                }
                Ok(_) => {}
                Err(e) => debug!(field = %field, strategy = %strategy, "strategy failed: {e}"),
            }
        }
    }

    capture.page_text = dom.page_text().await?;
    debug!(
        selectors_matched = capture.by_selector.len(),
        page_text_len = capture.page_text.len(),
        "Field capture complete"
    );
    Ok(capture)
}
