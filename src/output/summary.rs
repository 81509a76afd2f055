//! End-of-run summary

use chrono::{DateTime, Utc};

/// Outcome counts of a crawler's lifetime, produced by shutdown
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Distinct page URLs that were admitted and not recorded as failed
    pub crawled: usize,

    /// Page URLs that failed permanently
    pub failed_crawls: Vec<String>,

    /// Files saved under the download root
    pub downloaded: usize,

    /// Download URLs that failed permanently
    pub failed_downloads: Vec<String>,
}

impl CrawlSummary {
    /// Builds a summary from registry sizes, saved files and collector contents
    ///
    /// A page URL that was admitted but never recorded as failed counts as
    /// crawled. Downloads are counted as saved, since a redirect target that
    /// gets retried is admitted under its own URL.
    pub fn from_counts(
        started_at: DateTime<Utc>,
        crawl_urls: usize,
        failed_crawls: Vec<String>,
        downloaded: usize,
        failed_downloads: Vec<String>,
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            crawled: crawl_urls.saturating_sub(failed_crawls.len()),
            failed_crawls,
            downloaded,
            failed_downloads,
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Writes the summary to the log
    pub fn log(&self) {
        tracing::info!("Successfully crawled {} URLs.", self.crawled);
        if !self.failed_crawls.is_empty() {
            tracing::warn!("Failed to crawl {} URLs:", self.failed_crawls.len());
            for url in &self.failed_crawls {
                tracing::warn!("\t{}", url);
            }
        }

        tracing::info!("Successfully downloaded {} files.", self.downloaded);
        if !self.failed_downloads.is_empty() {
            tracing::warn!("Failed to download {} files:", self.failed_downloads.len());
            for url in &self.failed_downloads {
                tracing::warn!("\t{}", url);
            }
        }

        tracing::info!("Run finished in {}s", self.duration_seconds());
    }
}
