//! Readiness helpers for chromiumoxide pages

use chromiumoxide::Page;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::utils::READY_STATE_POLL_MS;

/// Current page URL, `about:blank` when unavailable
pub async fn page_url_or_blank(page: &Page) -> String {
    match page.url().await {
        Ok(Some(url)) => url,
        Ok(None) => "about:blank".to_string(),
        Err(e) => {
            trace!("Failed to get page URL: {}", e);
            "about:blank".to_string()
        }
    }
}

/// Poll `document.readyState` until `complete` with a body, or `max_wait`
///
/// Returns whether the page reported ready. Running out of time is not an
/// error; capture proceeds on whatever has rendered.
pub async fn wait_for_ready_state(page: &Page, max_wait: Duration) -> bool {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(READY_STATE_POLL_MS);
    let script = "({ readyState: document.readyState, bodyExists: document.body !== null })";

    while start.elapsed() < max_wait {
        match page.evaluate(script).await {
            Ok(result) => {
                if let Ok(value) = result.into_value::<serde_json::Value>() {
                    let complete = value.get("readyState").and_then(|v| v.as_str()) == Some("complete");
                    let body = value.get("bodyExists").and_then(serde_json::Value::as_bool).unwrap_or(false);
                    if complete && body {
                        debug!("Page ready after {}ms", start.elapsed().as_millis());
                        return true;
                    }
                }
            }
            Err(e) => trace!("readyState check failed: {}, retrying", e),
        }
        tokio::time::sleep(poll_interval).await;
    }

    debug!("readyState not complete after {}ms, proceeding", max_wait.as_millis());
    false
}

/// Poll for `selector` until it matches or `timeout` passes
pub async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(READY_STATE_POLL_MS)).await;
    }
}
