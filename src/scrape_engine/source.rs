use async_trait::async_trait;

use super::context::ScrapeContext;
use super::errors::ScrapeResult;
use crate::field_extractor::RawFieldCapture;

/// Raw text of one loaded page, with timings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCapture {
    pub raw: RawFieldCapture,
    pub page_load_ms: u64,
    pub capture_ms: u64,
}

/// Environment stamped into record metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub browser_type: String,
    pub user_agent: Option<String>,
    pub screen_resolution: Option<String>,
}

/// Where page captures come from
///
/// The orchestrator only sees this trait. `BrowserCapture` drives a real
/// browser; tests substitute scripted sources.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn initialize(&self) -> ScrapeResult<()>;

    /// Load `ctx.target` on a fresh page and capture its fields
    ///
    /// One call is one page lifecycle; the page is closed before returning.
    async fn capture(&self, ctx: &ScrapeContext) -> ScrapeResult<PageCapture>;

    /// Cheap liveness check
    async fn probe(&self) -> ScrapeResult<()>;

    async fn shutdown(&self) -> ScrapeResult<()>;

    fn describe(&self) -> SourceInfo;
}
