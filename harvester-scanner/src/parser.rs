//! Raw bytes to a queryable document.
//!
//! [`ParsedDocument`] is a thin layer over [`scraper::Html`] exposing the
//! three lookups the traversal needs: CSS selection, text matching by
//! regex, and link resolution against the page URL.

use crate::error::{ExtractionError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, info};
use url::Url;

pub struct ParsedDocument {
    html: Html,
    base_url: Option<Url>,
}

/// Parse raw page content. Fails only when there is no markup to parse.
pub fn parse(raw: &[u8]) -> Result<ParsedDocument> {
    let content = String::from_utf8_lossy(raw);
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(ExtractionError::MalformedDocument(
            "document is empty".to_string(),
        ));
    }
    if !trimmed.contains('<') {
        return Err(ExtractionError::MalformedDocument(
            "document contains no markup".to_string(),
        ));
    }

    let document = ParsedDocument {
        html: Html::parse_document(trimmed),
        base_url: None,
    };

    match document.title() {
        Some(title) => info!(title = %title, "Parsed page"),
        None => debug!("Parsed page without a title"),
    }

    Ok(document)
}

/// Parse a page fetched from `url`, so relative links resolve against it.
pub fn parse_page(raw: &[u8], url: &str) -> Result<ParsedDocument> {
    Ok(parse(raw)?.with_base_url(url))
}

impl ParsedDocument {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Url::parse(url).ok();
        self
    }

    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    pub fn select_first(&self, css: &str) -> Result<Option<ElementRef<'_>>> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).next())
    }

    /// Element directly holding the first text node that matches `pattern`.
    /// Text inside `<script>` and `<style>` is ignored.
    pub fn find_text(&self, pattern: &Regex) -> Option<ElementRef<'_>> {
        self.html.tree.root().descendants().find_map(|node| {
            let text = node.value().as_text()?;
            let parent = ElementRef::wrap(node.parent()?)?;
            if is_raw_text_element(parent) || !pattern.is_match(text) {
                return None;
            }
            Some(parent)
        })
    }

    /// Absolute form of `href`, without fragment. Script, mail and
    /// in-page links yield `None`.
    pub fn resolve_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with('#')
        {
            return None;
        }

        let mut resolved = match &self.base_url {
            Some(base) => base.join(href).ok()?,
            None => Url::parse(href).ok()?,
        };
        resolved.set_fragment(None);

        Some(resolved.to_string())
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ExtractionError::InvalidSelector(format!("'{}': {}", css, e)))
}

fn is_raw_text_element(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "script" | "style")
}

/// Visible text of an element with whitespace collapsed. Line breaks and
/// block boundaries become single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(is_raw_text_element);
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if matches!(el.name(), "br" | "li" | "p" | "div" | "td" | "th") => {
                out.push(' ');
            }
            _ => {}
        }
    }
    normalize_whitespace(&out)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `element` itself or its nearest ancestor with the given tag name.
pub fn closest<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    if element.value().name() == tag {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == tag)
}
