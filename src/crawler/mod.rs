//! Crawler module for page crawls and file downloads
//!
//! This module contains the core orchestration logic, including:
//! - The worker pool and submission API (`Crawler`)
//! - Page fetching and HTML parsing for the handler chain
//! - The redirect-following download state machine
//! - Task values queued between submission and execution

mod coordinator;
pub mod fetcher;
mod parser;
mod task;

pub use coordinator::{Crawler, CrawlerBuilder};
pub use fetcher::{
    build_download_client, build_page_client, download_file, fetch_page, DownloadContext,
    DownloadOutcome, DOWNLOAD_USER_AGENT,
};
pub use parser::{element_text, parse_page, Page};
pub use task::{CrawlTask, DownloadTask, Task};
