//! HTML parsing for crawled pages
//!
//! A crawled page is handed to the handler chain as a [`Page`]: the parsed
//! document plus the URL it was served from, so that relative links can be
//! resolved the way a browser would.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fetched and parsed HTML page
pub struct Page {
    /// URL the page was served from (after any transparent redirects)
    pub url: Url,

    /// The parsed document
    pub document: Html,
}

impl Page {
    /// Selects all elements matching a CSS selector
    ///
    /// An invalid selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.document.select(&selector).collect(),
            Err(e) => {
                tracing::warn!("Invalid selector '{}': {:?}", css, e);
                Vec::new()
            }
        }
    }

    /// Selects the first element matching a CSS selector
    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        self.select(css).into_iter().next()
    }

    /// Resolves an `href` against the page URL
    pub fn abs_url(&self, href: &str) -> Option<String> {
        resolve_link(href, &self.url)
    }

    /// Resolves the named attribute of an element against the page URL
    pub fn abs_attr(&self, element: &ElementRef<'_>, attr: &str) -> Option<String> {
        element
            .value()
            .attr(attr)
            .and_then(|href| self.abs_url(href))
    }

    /// Returns the page title, if any
    pub fn title(&self) -> Option<String> {
        self.select_first("title")
            .map(|element| element_text(&element))
            .filter(|s| !s.is_empty())
    }
}

/// Parses an HTML body served from `url`
///
/// # Example
///
/// ```
/// use crawldown::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page = parse_page(html, Url::parse("https://example.com/").unwrap());
/// assert_eq!(page.title(), Some("Test".to_string()));
/// assert_eq!(page.abs_url("/page"), Some("https://example.com/page".to_string()));
/// ```
pub fn parse_page(html: &str, url: Url) -> Page {
    Page {
        url,
        document: Html::parse_document(html),
    }
}

/// Returns the text content of an element with whitespace runs collapsed
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None for empty hrefs, fragment-only links, `javascript:`,
/// `mailto:`, `tel:` and `data:` links, and anything that does not resolve
/// to http(s).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
