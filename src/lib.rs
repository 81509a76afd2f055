//! Crawldown: a concurrent crawl and download orchestrator
//!
//! This crate runs page crawls and file downloads on a fixed pool of workers,
//! bounds the number of attempts made for every URL, follows download
//! redirects by hand so that referer and cookies travel with each hop, and
//! waits for all outstanding work (retries included) before shutting down.

pub mod config;
pub mod crawler;
pub mod handlers;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl and download operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("File name '{filename}' is outside the download root")]
    InvalidFilename { filename: String },

    #[error("Transient failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Bad request for {url}: {message}")]
    BadRequest { url: String, message: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Max tries reached for {url}")]
    Exhausted { url: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download log error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true if the failure must be recorded in a failure collector
    ///
    /// Malformed URLs and rejected file names are terminal but never collected.
    pub fn is_recorded(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::BadRequest { .. }
                | Self::RedirectLimit { .. }
                | Self::Exhausted { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid path in config: {0}")]
    InvalidPath(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlerSettings};
pub use crawler::{Crawler, CrawlerBuilder};
pub use handlers::{Handler, Page};
pub use output::{CrawlSummary, DownloadedFile};
pub use url::{sanitize_filename, sanitize_url};
