//! Site handlers
//!
//! A handler looks at a crawled page and decides what to crawl or download
//! next by submitting work back to the [`Crawler`]. Handlers are consulted in
//! registration order and the first one that accepts a page wins.

pub mod pdfdrive;
pub mod springer;

pub use crate::crawler::Page;
pub use pdfdrive::PdfdriveHandler;
pub use springer::SpringerHandler;

use crate::crawler::Crawler;

/// Capability consulted for every crawled page
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Handles a page; returns true if the page was accepted
    ///
    /// `url` is the URL the crawl was submitted with; `page.url` is where the
    /// page was finally served from. Called on a worker, so it must not block
    /// for long and must never call [`Crawler::shutdown`].
    fn handle(&self, url: &str, page: &Page, crawler: &Crawler) -> bool;
}
