//! Output module for run results
//!
//! This module handles:
//! - The JSON-lines log of completed downloads
//! - The summary logged and returned at shutdown

mod download_log;
mod summary;

pub use download_log::{read_download_log, DownloadLog, DownloadedFile};
pub use summary::CrawlSummary;
