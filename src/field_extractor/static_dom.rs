//! `DomQuery` over a static HTML document
//!
//! Used for saved pages and tests. `scraper::Html` is not `Send`, so the
//! document is re-parsed per query and never held across an await.

use async_trait::async_trait;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use super::capture::DomQuery;
use crate::scrape_engine::{ScrapeError, ScrapeResult};

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// A saved page, queried like a live one
#[derive(Debug, Clone)]
pub struct StaticDocument {
    html: String,
}

impl StaticDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    collapse_whitespace(&out)
}

/// Text with a newline at every block boundary
fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn body_of(doc: &Html) -> ElementRef<'_> {
    Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element())
}

fn innermost_containing<'a>(el: ElementRef<'a>, needle: &str) -> Option<ElementRef<'a>> {
    for child in el.children().filter_map(ElementRef::wrap) {
        if SKIPPED_ELEMENTS.contains(&child.value().name()) {
            continue;
        }
        if element_text(child).to_lowercase().contains(needle) {
            return Some(innermost_containing(child, needle).unwrap_or(child));
        }
    }
    None
}

#[async_trait]
impl DomQuery for StaticDocument {
    async fn select_text(&self, css: &str, attribute: Option<&str>) -> ScrapeResult<Option<String>> {
        let selector = Selector::parse(css)
            .map_err(|e| ScrapeError::Extraction(format!("invalid selector '{css}': {e}")))?;
        let doc = self.parse();

        let found = doc.select(&selector).find_map(|el| {
            let text = match attribute {
                Some(attr) => el.value().attr(attr).map(|v| v.trim().to_string()),
                None => Some(element_text(el)),
            };
            text.filter(|t| !t.is_empty())
        });
        Ok(found)
    }

    async fn text_containing(&self, label: &str) -> ScrapeResult<Option<String>> {
        let doc = self.parse();
        let body = body_of(&doc);
        let needle = label.to_lowercase();

        let mut el = match innermost_containing(body, &needle) {
            Some(el) => el,
            None if element_text(body).to_lowercase().contains(&needle) => body,
            None => return Ok(None),
        };

        for _ in 0..3 {
            if element_text(el).chars().any(|c| c.is_ascii_digit()) {
                break;
            }
            match el.parent().and_then(ElementRef::wrap) {
                Some(parent) if !matches!(parent.value().name(), "body" | "html") => el = parent,
                _ => break,
            }
        }

        let text = element_text(el);
        Ok((!text.is_empty()).then_some(text))
    }

    async fn page_text(&self) -> ScrapeResult<String> {
        let doc = self.parse();
        let mut raw = String::new();
        collect_text(body_of(&doc), &mut raw);
        Ok(raw
            .lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Wartezeit Notaufnahme</title><script>var wartezeit = 1;</script></head>
        <body>
          <div class="widget">
            <div class="er-box"><span>Wartezeit:</span> <strong>45</strong> <span>min</span></div>
            <p>Patienten in <b>Behandlung</b>: 12</p>
            <time datetime="2024-03-01T11:57:00Z">vor 3 min</time>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_select_text_and_attribute() {
        let doc = StaticDocument::new(PAGE);
        assert_eq!(
            doc.select_text("time[datetime]", Some("datetime")).await.unwrap().as_deref(),
            Some("2024-03-01T11:57:00Z")
        );
        assert_eq!(doc.select_text("time", None).await.unwrap().as_deref(), Some("vor 3 min"));
        assert_eq!(doc.select_text(".missing", None).await.unwrap(), None);
        assert!(doc.select_text("[[[", None).await.is_err());
    }

    #[tokio::test]
    async fn test_text_containing_widens_to_the_number() {
        let doc = StaticDocument::new(PAGE);
        let text = doc.text_containing("wartezeit").await.unwrap();
        assert_eq!(text.as_deref(), Some("Wartezeit: 45 min"));
    }

    #[tokio::test]
    async fn test_page_text_keeps_blocks_on_their_own_lines() {
        let doc = StaticDocument::new(PAGE);
        let text = doc.page_text().await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"Wartezeit: 45 min"));
        assert!(lines.contains(&"Patienten in Behandlung: 12"));
        assert!(lines.contains(&"vor 3 min"));
        assert!(!text.contains("var wartezeit"));
    }
}
