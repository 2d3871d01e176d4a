//! `DomQuery` over a live chromiumoxide page

use async_trait::async_trait;
use chromiumoxide::Page;

use super::capture::DomQuery;
use crate::scrape_engine::{ScrapeError, ScrapeResult};

/// Innermost element containing the label, widened up to three levels
/// until its text holds a digit
const TEXT_CONTAINING_JS: &str = r"
(function (label) {
    const needle = label.toLowerCase();
    const skip = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD']);
    const text = (el) => (el.innerText || el.textContent || '');
    const inner = (el) => {
        for (const child of el.children) {
            if (skip.has(child.tagName)) continue;
            if (text(child).toLowerCase().includes(needle)) return inner(child) || child;
        }
        return null;
    };
    const body = document.body;
    if (!body) return null;
    let el = inner(body) || (text(body).toLowerCase().includes(needle) ? body : null);
    if (!el) return null;
    for (let i = 0; i < 3 && !/\d/.test(text(el)) && el.parentElement && el.parentElement !== body; i++) {
        el = el.parentElement;
    }
    const out = text(el).replace(/\s+/g, ' ').trim();
    return out.length ? out : null;
})";

#[async_trait]
impl DomQuery for Page {
    async fn select_text(&self, css: &str, attribute: Option<&str>) -> ScrapeResult<Option<String>> {
        for element in self.find_elements(css).await? {
            let value = match attribute {
                Some(attr) => element.attribute(attr).await?,
                None => element.inner_text().await?,
            };
            if let Some(text) = value.map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
                && !text.is_empty()
            {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    async fn text_containing(&self, label: &str) -> ScrapeResult<Option<String>> {
        let arg = serde_json::to_string(label).map_err(|e| ScrapeError::Other(e.to_string()))?;
        let script = format!("{TEXT_CONTAINING_JS}({arg})");
        let result = self.evaluate(script).await?;
        Ok(result.into_value::<Option<String>>().ok().flatten())
    }

    async fn page_text(&self) -> ScrapeResult<String> {
        self.evaluate("document.body ? document.body.innerText : ''")
            .await?
            .into_value::<String>()
            .map_err(|e| ScrapeError::Protocol(format!("reading page text: {e}")))
    }
}
