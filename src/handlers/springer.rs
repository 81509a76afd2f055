use crate::crawler::{element_text, Crawler, Page};
use crate::handlers::Handler;
use crate::url::sanitize_filename;
use std::time::Duration;

/// Article listing the free Springer machine learning books
pub const ML_65_URL: &str = "https://towardsdatascience.com/springer-has-released-65-machine-learning-and-data-books-for-free-961f8181f189";

/// Prefix of Springer book landing pages
pub const BOOK_URL_PREFIX: &str = "http://link.springer.com/openurl?";

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_TRIES: u32 = 2;

const PDF_LINK_TITLE: &str = "Download this book in PDF format";

/// Downloads the PDFs of the books linked from an index article
pub struct SpringerHandler {
    index_url: String,
    book_prefix: String,
    timeout: Duration,
    max_tries: u32,
}

impl SpringerHandler {
    pub fn new() -> Self {
        Self::with_urls(ML_65_URL, BOOK_URL_PREFIX)
    }

    /// Creates a handler for a different index page and book URL prefix
    pub fn with_urls(index_url: &str, book_prefix: &str) -> Self {
        Self {
            index_url: index_url.to_string(),
            book_prefix: book_prefix.to_string(),
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

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    fn handle_index(&self, page: &Page, crawler: &Crawler) {
        for link in page.select("a[href]") {
            if let Some(book_url) = link.value().attr("href") {
                if book_url.starts_with(&self.book_prefix) {
                    crawler.crawl(book_url, self.timeout, self.max_tries);
                }
            }
        }
    }

    fn handle_book(&self, url: &str, page: &Page, crawler: &Crawler) {
        let title = page.select_first(".page-title > h1");
        let pdf_link = page.select_first(&format!("a[title=\"{}\"]", PDF_LINK_TITLE));

        let pdf_url = pdf_link.and_then(|link| page.abs_attr(&link, "href"));
        match (title, pdf_url) {
            (Some(title), Some(pdf_url)) => {
                let filename = format!("{}.pdf", sanitize_filename(&element_text(&title)));
                crawler.download(&pdf_url, &filename, "", "", self.timeout, self.max_tries);
            }
            _ => {
                tracing::warn!("Failed to find title/pdf element for '{}'.", url);
                if !crawler.retry_crawl(url, self.timeout, self.max_tries) {
                    tracing::warn!("Too many failures on '{}', won't retry.", url);
                }
            }
        }
    }
}

impl Default for SpringerHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for SpringerHandler {
    fn name(&self) -> &str {
        "springer"
    }

    fn handle(&self, url: &str, page: &Page, crawler: &Crawler) -> bool {
        if url == self.index_url {
            self.handle_index(page, crawler);
            true
        } else if url.starts_with(&self.book_prefix) {
            self.handle_book(url, page, crawler);
            true
        } else {
            false
        }
    }
}
