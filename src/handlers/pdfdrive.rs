use crate::crawler::{element_text, Crawler, Page};
use crate::handlers::Handler;
use crate::url::sanitize_filename;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

pub const BASE_URL: &str = "https://www.pdfdrive.com";

pub const TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TRIES: u32 = 2;

static BOOK_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+-e[0-9]+\.html$").expect("book URL regex is valid"));

static TAG_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-0-9a-z]+-books\.html$").expect("tag page regex is valid"));

static ON_CLICK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^initConverter\('([0-9]+)','([0-9a-f]+)','EPUB'\);.*$")
        .expect("onclick regex is valid")
});

/// Walks PDF Drive listings and downloads every book's PDF
pub struct PdfdriveHandler {
    base: String,
    timeout: Duration,
    max_tries: u32,
}

impl PdfdriveHandler {
    pub fn new() -> Self {
        Self::with_base(BASE_URL)
    }

    /// Creates a handler for a mirror of the site rooted at `base`
    pub fn with_base(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            timeout: TIMEOUT,
            max_tries: MAX_TRIES,
        }
    }

    /// Overrides the timeout and attempt bound used for submitted work
    pub fn with_limits(mut self, timeout: Duration, max_tries: u32) -> Self {
        self.timeout = timeout;
        self.max_tries = max_tries;
        self
    }

    pub fn category_url(&self, category: &str) -> String {
        format!("{}/category/{}", self.base, category)
    }

    /// Search page URL; the query is form-encoded
    pub fn search_url(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!("{}/search?q={}", self.base, encoded)
    }

    /// Tag page URL; the tag is lowercased and spaces become dashes
    pub fn tag_url(&self, tag: &str) -> String {
        format!(
            "{}/{}-books.html",
            self.base,
            tag.to_lowercase().replace(' ', "-")
        )
    }

    fn pdf_url(&self, id: &str, hash: &str) -> String {
        format!(
            "{}/download.pdf?id={}&h={}&u=cache&ext=pdf",
            self.base, id, hash
        )
    }

    fn is_listing(&self, url: &str) -> bool {
        url.starts_with(&format!("{}/category/", self.base))
            || url.starts_with(&format!("{}/search?q=", self.base))
            || url
                .strip_prefix(&format!("{}/", self.base))
                .is_some_and(|rest| TAG_PAGE.is_match(rest))
    }

    fn handle_listing(&self, page: &Page, crawler: &Crawler) {
        for link in page.select(".files-new a") {
            let book_url = page.abs_attr(&link, "href").unwrap_or_default();
            if BOOK_URL.is_match(&book_url) {
                crawler.crawl(&book_url, self.timeout, self.max_tries);
            } else {
                tracing::warn!("Unknown URL '{}'.", book_url);
            }
        }

        for link in page.select(".pagination li > a") {
            let unclassed = link.value().attr("class").map_or(true, str::is_empty);
            if unclassed {
                if let Some(next) = page.abs_attr(&link, "href") {
                    crawler.crawl(&next, self.timeout, self.max_tries);
                }
            }
        }
    }

    fn handle_book(&self, url: &str, page: &Page, crawler: &Crawler) {
        let Some(title) = page.select_first(".ebook-main h1") else {
            tracing::warn!("Failed to find title element for '{}'.", url);
            if !crawler.retry_crawl(url, self.timeout, self.max_tries) {
                tracing::warn!("Too many failures on '{}', won't retry.", url);
            }
            return;
        };

        let pdf_url = page.select("a.dropdown-item").iter().find_map(|item| {
            let onclick = item.value().attr("onclick")?;
            let caps = ON_CLICK.captures(onclick)?;
            Some(self.pdf_url(&caps[1], &caps[2]))
        });

        match pdf_url {
            Some(pdf_url) => {
                let filename = format!("{}.pdf", sanitize_filename(&element_text(&title)));
                crawler.download(&pdf_url, &filename, "", "", self.timeout, self.max_tries);
            }
            None => tracing::warn!("Cannot find PDF download link for '{}'", url),
        }
    }
}

impl Default for PdfdriveHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for PdfdriveHandler {
    fn name(&self) -> &str {
        "pdfdrive"
    }

    fn handle(&self, url: &str, page: &Page, crawler: &Crawler) -> bool {
        if self.is_listing(url) {
            self.handle_listing(page, crawler);
            true
        } else if BOOK_URL.is_match(url) {
            self.handle_book(url, page, crawler);
            true
        } else {
            false
        }
    }
}
