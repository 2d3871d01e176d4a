//! Error taxonomy for scrape operations
//!
//! Browser and extraction layers return `ScrapeError`; the retry engine
//! classifies it by kind name and message, and the orchestrator folds it into
//! a structured `ScrapingResult`.

use crate::retry::RetryableError;

/// Errors raised while driving the browser or reading the page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScrapeError {
    /// Browser process could not be started
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    /// A page was requested before `initialize()`
    #[error("Browser session not initialized")]
    NotInitialized,

    /// Navigation or network failure (DNS, reset, refused)
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A network-facing operation exceeded its explicit timeout
    #[error("{operation} timeout after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// DevTools protocol failure (session closed, target gone, desync)
    #[error("Browser protocol error: {0}")]
    Protocol(String),

    /// Page loaded but the required fields could not be read
    #[error("{0}")]
    Extraction(String),

    /// Parsed metric failed record-level validation
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Scrape error: {0}")]
    Other(String),
}

impl ScrapeError {
    /// Stable error name used for retry signature matching
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::BrowserLaunch(_) => "BrowserLaunchError",
            Self::NotInitialized => "NotInitializedError",
            Self::Navigation(_) => "NavigationError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Protocol(_) => "ProtocolError",
            Self::Extraction(_) => "ExtractionError",
            Self::Validation(_) => "ValidationError",
            Self::Other(_) => "Error",
        }
    }

    /// Data and logic failures, as opposed to transient faults
    #[must_use]
    pub const fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction(_) | Self::Validation(_))
    }

    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }
}

impl RetryableError for ScrapeError {
    fn kind_name(&self) -> &str {
        ScrapeError::kind_name(self)
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            Self::timeout("CDP request", 0)
        } else if lower.contains("net::err") || lower.contains("dns") {
            Self::Navigation(msg)
        } else {
            Self::Protocol(msg)
        }
    }
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for Result with `ScrapeError`
pub type ScrapeResult<T> = Result<T, ScrapeError>;
