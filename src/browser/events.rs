//! Page event observers
//!
//! Observers are registered on the session manager and attached to every
//! page it creates. Each page gets one listener task per CDP event type;
//! the task calls every observer in registration order. Tasks are aborted
//! when the page is closed.

use std::sync::Arc;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::scrape_engine::ScrapeResult;

/// Browser-side events surfaced to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Console { level: String, text: String },
    PageError { message: String },
    Response { url: String, status: i64 },
}

pub trait PageObserver: Send + Sync {
    fn on_event(&self, page_id: &str, event: &PageEvent);
}

/// Writes page events to the log
///
/// Console output goes to `debug`, uncaught exceptions and HTTP error
/// responses to `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl PageObserver for LoggingObserver {
    fn on_event(&self, page_id: &str, event: &PageEvent) {
        match event {
            PageEvent::Console { level, text } => {
                debug!(page_id, level = %level, "console: {text}");
            }
            PageEvent::PageError { message } => {
                warn!(page_id, "page error: {message}");
            }
            PageEvent::Response { url, status } if *status >= 400 => {
                warn!(page_id, status, "HTTP error response: {url}");
            }
            PageEvent::Response { .. } => {}
        }
    }
}

pub(crate) type ObserverList = Arc<[Arc<dyn PageObserver>]>;

fn dispatch(observers: &ObserverList, page_id: &str, event: &PageEvent) {
    for observer in observers.iter() {
        observer.on_event(page_id, event);
    }
}

/// Subscribe `observers` to `page`'s console, exception and response events
pub(crate) async fn attach_observers(
    page: &Page,
    page_id: &str,
    observers: ObserverList,
) -> ScrapeResult<Vec<JoinHandle<()>>> {
    if observers.is_empty() {
        return Ok(Vec::new());
    }

    let mut tasks = Vec::with_capacity(3);

    let mut console = page.event_listener::<EventConsoleApiCalled>().await?;
    let list = observers.clone();
    let id = page_id.to_string();
    tasks.push(tokio::spawn(async move {
        while let Some(ev) = console.next().await {
            let text = ev
                .args
                .iter()
                .filter_map(|arg| {
                    arg.value
                        .as_ref()
                        .map(|v| match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .or_else(|| arg.description.clone())
                })
                .collect::<Vec<_>>()
                .join(" ");
            let event = PageEvent::Console {
                level: format!("{:?}", ev.r#type).to_lowercase(),
                text,
            };
            dispatch(&list, &id, &event);
        }
    }));

    let mut exceptions = page.event_listener::<EventExceptionThrown>().await?;
    let list = observers.clone();
    let id = page_id.to_string();
    tasks.push(tokio::spawn(async move {
        while let Some(ev) = exceptions.next().await {
            let details = &ev.exception_details;
            let message = details
                .exception
                .as_ref()
                .and_then(|ex| ex.description.clone())
                .unwrap_or_else(|| details.text.clone());
            dispatch(&list, &id, &PageEvent::PageError { message });
        }
    }));

    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let id = page_id.to_string();
    tasks.push(tokio::spawn(async move {
        while let Some(ev) = responses.next().await {
            let event = PageEvent::Response {
                url: ev.response.url.clone(),
                status: ev.response.status,
            };
            dispatch(&observers, &id, &event);
        }
    }));

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, PageEvent)>>);

    impl PageObserver for Recorder {
        fn on_event(&self, page_id: &str, event: &PageEvent) {
            self.0.lock().push((page_id.to_string(), event.clone()));
        }
    }

    #[test]
    fn test_dispatch_reaches_every_observer_in_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let list: ObserverList = vec![
            first.clone() as Arc<dyn PageObserver>,
            Arc::new(LoggingObserver),
            second.clone() as Arc<dyn PageObserver>,
        ]
        .into();

        let event = PageEvent::Response {
            url: "https://example.org/".into(),
            status: 503,
        };
        dispatch(&list, "page-1", &event);

        assert_eq!(first.0.lock().as_slice(), &[("page-1".to_string(), event.clone())]);
        assert_eq!(second.0.lock().len(), 1);
    }
}
