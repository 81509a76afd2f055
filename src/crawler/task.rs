//! Units of work executed by the worker pool

use std::time::Duration;

/// A page to fetch and hand to the handler chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub timeout: Duration,
    pub max_tries: u32,
}

/// A file to fetch and save under the download root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,

    /// Destination relative to the download root
    pub filename: String,

    /// `Referer` to send with the first request (empty for none)
    pub referer: String,

    /// `Cookie` to send with the first request (empty for none)
    pub cookies: String,

    pub timeout: Duration,
    pub max_tries: u32,
}

/// A queued unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Crawl(CrawlTask),
    Download(DownloadTask),
}

impl Task {
    pub fn url(&self) -> &str {
        match self {
            Task::Crawl(task) => &task.url,
            Task::Download(task) => &task.url,
        }
    }
}
