//! Browser session manager
//!
//! Owns one browser process and one browser context. Pages are created in
//! that context for a single scrape attempt and closed right after. No
//! retries happen here; failures propagate to the caller for
//! classification.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{ObserverList, PageObserver, attach_observers};
use super::wrapper::BrowserWrapper;
use crate::browser_setup::launch_browser;
use crate::config::BrowserSettings;
use crate::scrape_engine::page_timeout::with_page_timeout;
use crate::scrape_engine::{ScrapeError, ScrapeResult};

struct ActiveSession {
    wrapper: BrowserWrapper,
    context_id: Option<BrowserContextId>,
}

/// A page created by the session manager
///
/// Hand it back to `close_page` when done.
#[derive(Debug)]
pub struct ManagedPage {
    id: String,
    page: Page,
}

impl ManagedPage {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl Deref for ManagedPage {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

pub struct BrowserSessionManager {
    settings: BrowserSettings,
    session: Mutex<Option<ActiveSession>>,
    observers: parking_lot::RwLock<Vec<Arc<dyn PageObserver>>>,
    listeners: parking_lot::Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
    page_counter: AtomicU64,
}

impl BrowserSessionManager {
    /// Nothing is launched until `initialize()`
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
            observers: parking_lot::RwLock::new(Vec::new()),
            listeners: parking_lot::Mutex::new(HashMap::new()),
            page_counter: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Register an observer for pages created from now on
    pub fn add_observer(&self, observer: Arc<dyn PageObserver>) {
        self.observers.write().push(observer);
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.is_some()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// Launch the browser and open the shared context
    ///
    /// No-op when already initialized.
    ///
    /// # Errors
    ///
    /// `BrowserLaunch` when the process cannot start or the context cannot be
    /// created.
    pub async fn initialize(&self) -> ScrapeResult<()> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            debug!("Browser session already initialized");
            return Ok(());
        }

        let (mut browser, handler, user_data_dir) = launch_browser(&self.settings)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(format!("{e:#}")))?;

        let owned_dir = self.settings.user_data_dir.is_none().then_some(user_data_dir);

        let mut params = CreateBrowserContextParams::default();
        params.proxy_server = self.settings.proxy_server.clone();

        let context_id = match browser.create_browser_context(params).await {
            Ok(id) => id,
            Err(e) => {
                let mut wrapper = BrowserWrapper::new(browser, handler, owned_dir);
                let _ = wrapper.browser_mut().close().await;
                let _ = wrapper.browser_mut().wait().await;
                wrapper.cleanup_temp_dir();
                return Err(ScrapeError::BrowserLaunch(format!(
                    "failed to create browser context: {e}"
                )));
            }
        };

        info!(
            engine = %self.settings.engine,
            proxy = self.settings.proxy_server.as_deref().unwrap_or("none"),
            "Browser session initialized"
        );

        *guard = Some(ActiveSession {
            wrapper: BrowserWrapper::new(browser, handler, owned_dir),
            context_id: Some(context_id),
        });
        Ok(())
    }

    /// Open a fresh page in the shared context
    ///
    /// Viewport is applied and the registered observers are attached before
    /// the page is returned.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize()` or after `shutdown()`.
    pub async fn create_page(&self) -> ScrapeResult<ManagedPage> {
        let page = {
            let guard = self.session.lock().await;
            let session = guard.as_ref().ok_or(ScrapeError::NotInitialized)?;

            let mut builder = CreateTargetParams::builder().url("about:blank");
            if let Some(id) = &session.context_id {
                builder = builder.browser_context_id(id.clone());
            }
            let params = builder.build().map_err(ScrapeError::Protocol)?;

            with_page_timeout(
                async { Ok(session.wrapper.browser().new_page(params).await?) },
                self.request_timeout(),
                "Page creation",
            )
            .await?
        };

        if let Err(e) = self.prepare_page(&page).await {
            let _ = page.close().await;
            return Err(e);
        }

        let id = format!("page-{}", self.page_counter.fetch_add(1, Ordering::SeqCst) + 1);

        let observers: ObserverList = self.observers.read().iter().cloned().collect();
        match attach_observers(&page, &id, observers).await {
            Ok(tasks) if !tasks.is_empty() => {
                self.listeners.lock().insert(id.clone(), tasks);
            }
            Ok(_) => {}
            Err(e) => warn!(page_id = %id, "Failed to attach page observers: {e}"),
        }

        debug!(page_id = %id, "Page created");
        Ok(ManagedPage { id, page })
    }

    async fn prepare_page(&self, page: &Page) -> ScrapeResult<()> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(self.settings.viewport_width))
            .height(i64::from(self.settings.viewport_height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(ScrapeError::Protocol)?;

        with_page_timeout(
            async {
                page.execute(metrics).await?;
                page.execute(SetUserAgentOverrideParams::new(self.settings.user_agent.clone()))
                    .await?;
                Ok(())
            },
            self.request_timeout(),
            "Page setup",
        )
        .await
    }

    /// Close one page
    ///
    /// Safe after the page navigated away or was already closed; close
    /// failures are logged, not returned.
    pub async fn close_page(&self, page: ManagedPage) {
        if let Some(tasks) = self.listeners.lock().remove(&page.id) {
            for task in tasks {
                task.abort();
            }
        }

        let id = page.id;
        match tokio::time::timeout(self.request_timeout(), page.page.close()).await {
            Ok(Ok(())) => debug!(page_id = %id, "Page closed"),
            Ok(Err(e)) => debug!(page_id = %id, "Page already gone on close: {e}"),
            Err(_) => warn!(page_id = %id, "Page close timed out"),
        }
    }

    /// Open a blank page, navigate it, close it
    ///
    /// # Errors
    ///
    /// Whatever `create_page` or the navigation returned.
    pub async fn probe(&self) -> ScrapeResult<()> {
        let page = self.create_page().await?;
        let result = with_page_timeout(
            async {
                page.goto("about:blank").await?;
                Ok(())
            },
            Duration::from_secs(self.settings.navigation_timeout_secs),
            "Liveness probe",
        )
        .await;
        self.close_page(page).await;
        result
    }

    /// Close the context, then the browser process
    ///
    /// Idempotent. Already-closed errors are swallowed; anything else is
    /// returned after cleanup has finished.
    ///
    /// # Errors
    ///
    /// `Protocol` for unexpected failures while closing.
    pub async fn shutdown(&self) -> ScrapeResult<()> {
        let Some(mut session) = self.session.lock().await.take() else {
            debug!("Browser session already shut down");
            return Ok(());
        };

        for (_, tasks) in self.listeners.lock().drain() {
            for task in tasks {
                task.abort();
            }
        }

        let mut unexpected = Vec::new();

        if let Some(id) = session.context_id.take() {
            let dispose = session
                .wrapper
                .browser()
                .execute(DisposeBrowserContextParams::new(id));
            match tokio::time::timeout(self.request_timeout(), dispose).await {
                Ok(Ok(_)) => debug!("Browser context disposed"),
                Ok(Err(e)) if is_already_closed(&e.to_string()) => {
                    debug!("Browser context already gone: {e}");
                }
                Ok(Err(e)) => unexpected.push(format!("dispose context: {e}")),
                Err(_) => unexpected.push("dispose context: timed out".to_string()),
            }
        }

        match session.wrapper.browser_mut().close().await {
            Ok(_) => {}
            Err(e) if is_already_closed(&e.to_string()) => {
                debug!("Browser already closed: {e}");
            }
            Err(e) => unexpected.push(format!("close browser: {e}")),
        }

        if let Err(e) = session.wrapper.browser_mut().wait().await {
            debug!("Browser wait after close failed: {e}");
        }

        session.wrapper.cleanup_temp_dir();
        drop(session);

        info!("Browser session shut down");

        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(ScrapeError::Protocol(unexpected.join("; ")))
        }
    }
}

fn is_already_closed(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["closed", "not found", "no such", "channel", "disconnected", "connection reset"]
        .iter()
        .any(|needle| lower.contains(needle))
}
