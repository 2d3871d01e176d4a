//! Capture source backed by the browser session manager

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use super::context::ScrapeContext;
use super::errors::ScrapeResult;
use super::page_timeout::with_page_timeout;
use super::source::{CaptureSource, PageCapture, SourceInfo};
use crate::browser::page_helpers::{page_url_or_blank, wait_for_ready_state, wait_for_selector};
use crate::browser::{BrowserSessionManager, ManagedPage};
use crate::config::ReadinessSettings;
use crate::field_extractor::{DomQuery, MetricField, capture_fields};

pub struct BrowserCapture {
    session: Arc<BrowserSessionManager>,
    readiness: ReadinessSettings,
    readiness_selector: String,
}

impl BrowserCapture {
    #[must_use]
    pub fn new(session: Arc<BrowserSessionManager>, readiness: ReadinessSettings) -> Self {
        Self {
            session,
            readiness,
            readiness_selector: MetricField::WaitTime.css_selector_list(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<BrowserSessionManager> {
        &self.session
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.session.settings().navigation_timeout_secs)
    }

    /// Navigate, wait for readiness, settle
    async fn load(&self, page: &ManagedPage, ctx: &ScrapeContext) -> ScrapeResult<u64> {
        let started = Instant::now();
        let timeout = self.navigation_timeout();

        with_page_timeout(
            async {
                page.goto(ctx.target.url.as_str()).await?;
                Ok(())
            },
            timeout,
            "Page navigation",
        )
        .await?;

        with_page_timeout(
            async {
                page.wait_for_navigation().await?;
                Ok(())
            },
            timeout,
            "Page load",
        )
        .await?;

        let ready = wait_for_ready_state(
            page.page(),
            Duration::from_secs(self.readiness.ready_state_timeout_secs),
        )
        .await;

        let widget_present = wait_for_selector(
            page.page(),
            &self.readiness_selector,
            Duration::from_millis(self.readiness.selector_timeout_ms),
        )
        .await;

        let final_url = page_url_or_blank(page.page()).await;
        debug!(ready, widget_present, final_url = %final_url, "Readiness checks finished");
        tokio::time::sleep(Duration::from_millis(self.readiness.settle_delay_ms)).await;

        Ok(started.elapsed().as_millis() as u64)
    }

    async fn load_and_capture(&self, page: &ManagedPage, ctx: &ScrapeContext) -> ScrapeResult<PageCapture> {
        let page_load_ms = self.load(page, ctx).await?;

        let started = Instant::now();
        let dom: &dyn DomQuery = page.page();
        let raw = with_page_timeout(capture_fields(dom), self.navigation_timeout(), "Field capture").await?;

        Ok(PageCapture {
            raw,
            page_load_ms,
            capture_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl CaptureSource for BrowserCapture {
    async fn initialize(&self) -> ScrapeResult<()> {
        self.session.initialize().await
    }

    async fn capture(&self, ctx: &ScrapeContext) -> ScrapeResult<PageCapture> {
        let page = self.session.create_page().await?;
        debug!(page_id = page.id(), "Loading {}", ctx.target.url);

        let result = self.load_and_capture(&page, ctx).await;

        // closed on every path, success or not
        self.session.close_page(page).await;
        result
    }

    async fn probe(&self) -> ScrapeResult<()> {
        self.session.probe().await
    }

    async fn shutdown(&self) -> ScrapeResult<()> {
        info!("Shutting down browser capture source");
        self.session.shutdown().await
    }

    fn describe(&self) -> SourceInfo {
        let settings = self.session.settings();
        SourceInfo {
            browser_type: settings.engine.to_string(),
            user_agent: Some(settings.user_agent.clone()),
            screen_resolution: Some(settings.screen_resolution()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserSettings;
    use crate::model::ScrapeTarget;
    use crate::scrape_engine::ScrapeError;

    fn assert_send<T: Send>(value: T) -> T {
        value
    }

    #[tokio::test]
    async fn test_capture_future_is_send_and_needs_a_session() {
        let session = Arc::new(BrowserSessionManager::new(BrowserSettings::default()));
        let capture = BrowserCapture::new(session, ReadinessSettings::default());
        let ctx = ScrapeContext::new(ScrapeTarget::new("https://example.org/er", "emergency"));

        let result = assert_send(capture.capture(&ctx)).await;
        assert!(matches!(result, Err(ScrapeError::NotInitialized)));
    }
}
