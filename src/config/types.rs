use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Worker pool and download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of workers executing crawl and download tasks
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Directory that download file names are resolved against
    #[serde(rename = "download-root", default = "default_download_root")]
    pub download_root: String,

    /// Optional JSON-lines log of completed downloads
    #[serde(rename = "download-log", default)]
    pub download_log: Option<String>,

    /// Maximum redirect hops followed within one attempt
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,
}

/// Per-submission defaults used by the bundled site handlers and the CLI
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts allowed per URL
    #[serde(rename = "max-tries", default = "default_max_tries")]
    pub max_tries: u32,
}

fn default_workers() -> u32 {
    3
}

fn default_download_root() -> String {
    ".".to_string()
}

fn default_max_redirects() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_tries() -> u32 {
    2
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            download_root: default_download_root(),
            download_log: None,
            max_redirects: default_max_redirects(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_tries: default_max_tries(),
        }
    }
}

/// Runtime settings for a [`crate::Crawler`]
///
/// This is the resolved view of a [`Config`]: sizes as `usize`, paths as
/// `PathBuf` and timeouts as `Duration`.
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    pub workers: usize,
    pub download_root: PathBuf,
    pub download_log: Option<PathBuf>,
    pub max_redirects: usize,
    pub default_timeout: Duration,
    pub default_max_tries: u32,
}

impl CrawlerSettings {
    /// Creates settings with the given pool size and download root, everything
    /// else at its default
    pub fn new(workers: usize, download_root: impl Into<PathBuf>) -> Self {
        let defaults = DefaultsConfig::default();
        Self {
            workers,
            download_root: download_root.into(),
            download_log: None,
            max_redirects: default_max_redirects() as usize,
            default_timeout: Duration::from_millis(defaults.timeout_ms),
            default_max_tries: defaults.max_tries,
        }
    }

    /// Sets the download log path
    pub fn with_download_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_log = Some(path.into());
        self
    }
}

impl From<&Config> for CrawlerSettings {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.crawler.workers as usize,
            download_root: PathBuf::from(&config.crawler.download_root),
            download_log: config
                .crawler
                .download_log
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            max_redirects: config.crawler.max_redirects as usize,
            default_timeout: Duration::from_millis(config.defaults.timeout_ms),
            default_max_tries: config.defaults.max_tries,
        }
    }
}
