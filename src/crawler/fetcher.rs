//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the page and download clients
//! - Fetching pages for the handler chain
//! - The download state machine: manual redirects with referer and cookie
//!   propagation, saving the body, and failure classification

use crate::crawler::task::{CrawlTask, DownloadTask};
use crate::output::{DownloadLog, DownloadedFile};
use crate::url::{host_header, parse_target, resolve_redirect};
use crate::CrawlError;
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, ACCEPT, ACCEPT_ENCODING, COOKIE, HOST, LOCATION, REFERER, SET_COOKIE, USER_AGENT,
};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

/// User agent sent with every download request
pub const DOWNLOAD_USER_AGENT: &str = "Wget/1.19.4 (linux-gnu)";

/// User agent sent with page fetches
pub const PAGE_USER_AGENT: &str = concat!("crawldown/", env!("CARGO_PKG_VERSION"));

/// Longest server message kept from a 400 response
const MAX_SERVER_MESSAGE: usize = 200;

/// Result of one download attempt
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body was written to `path`
    Saved {
        /// URL that finally answered 200
        url: String,
        path: PathBuf,
        /// Redirect hops followed on the way
        redirects: usize,
    },

    /// The attempt ended without a file
    ///
    /// `task` reflects the state at the failing hop (url, referer and cookies
    /// after any redirects), ready to be resubmitted when `error` is transient.
    Failed { task: DownloadTask, error: CrawlError },
}

/// Everything a download attempt needs besides the task itself
pub struct DownloadContext<'a> {
    pub client: &'a Client,
    pub download_root: &'a Path,
    pub max_redirects: usize,
    pub log: Option<&'a DownloadLog>,
}

/// Builds the client used for page fetches
///
/// Page fetches follow redirects transparently, up to `max_redirects` hops.
pub fn build_page_client(max_redirects: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(PAGE_USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the client used for downloads
///
/// Redirects are handled manually and bodies are saved byte for byte, so the
/// client neither follows redirects nor decodes content.
pub fn build_download_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(false)
        .brotli(false)
        .build()
}

/// Fetches a page body for the handler chain
///
/// # Returns
///
/// * `Ok((Url, String))` - The URL that served the page and its body
/// * `Err(CrawlError::MalformedUrl)` - The URL cannot be requested
/// * `Err(CrawlError::Transient)` - Timeout, connection failure, non-success
///   status, or an unreadable body
pub async fn fetch_page(client: &Client, task: &CrawlTask) -> Result<(Url, String), CrawlError> {
    let url = parse_target(&task.url).map_err(|e| CrawlError::MalformedUrl {
        url: task.url.clone(),
        reason: e.to_string(),
    })?;

    let response = client
        .get(url)
        .timeout(task.timeout)
        .send()
        .await
        .map_err(|e| classify_request_error(&task.url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::Transient {
            url: task.url.clone(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let final_url = response.url().clone();
    let body = response.text().await.map_err(|e| CrawlError::Transient {
        url: task.url.clone(),
        reason: format!("Failed to read body: {}", e),
    })?;

    Ok((final_url, body))
}

/// Request state carried from one redirect hop to the next
#[derive(Debug, Clone)]
struct Hop {
    url: String,
    referer: String,
    cookies: String,
}

impl Hop {
    /// Builds the task that would resume from this hop
    fn to_task(&self, original: &DownloadTask) -> DownloadTask {
        DownloadTask {
            url: self.url.clone(),
            filename: original.filename.clone(),
            referer: self.referer.clone(),
            cookies: self.cookies.clone(),
            timeout: original.timeout,
            max_tries: original.max_tries,
        }
    }
}

/// Runs one download attempt
///
/// # State Machine
///
/// | Response | Action |
/// |----------|--------|
/// | 200 | Save body to `download_root/filename`, append to log |
/// | 301 / 302 / 303 | Referer = current URL, follow `Location`, adopt `Set-Cookie` |
/// | 404 | Terminal `NotFound` |
/// | 400 | Terminal `BadRequest` with the server message |
/// | anything else | `Transient` |
/// | network error | `Transient` (or `MalformedUrl` if the request cannot be built) |
///
/// Redirect hops do not count as attempts; more than `max_redirects` hops is
/// a terminal `RedirectLimit`.
pub async fn download_file(ctx: &DownloadContext<'_>, task: DownloadTask) -> DownloadOutcome {
    let Some(relative) = contained_path(&task.filename) else {
        let error = CrawlError::InvalidFilename {
            filename: task.filename.clone(),
        };
        return DownloadOutcome::Failed { task, error };
    };
    let path = ctx.download_root.join(relative);
    let mut hop = Hop {
        url: task.url.clone(),
        referer: task.referer.clone(),
        cookies: task.cookies.clone(),
    };
    let mut redirects = 0;

    loop {
        let url = match parse_target(&hop.url) {
            Ok(url) => url,
            Err(e) => {
                let error = CrawlError::MalformedUrl {
                    url: hop.url.clone(),
                    reason: e.to_string(),
                };
                return DownloadOutcome::Failed {
                    task: hop.to_task(&task),
                    error,
                };
            }
        };

        tracing::info!("Downloading '{}'...", hop.url);
        let response = match send_download_request(ctx.client, &url, &hop, task.timeout).await {
            Ok(response) => response,
            Err(e) => {
                let error = classify_request_error(&hop.url, e);
                return DownloadOutcome::Failed {
                    task: hop.to_task(&task),
                    error,
                };
            }
        };

        match response.status() {
            StatusCode::OK => {
                if let Err(error) = save_body(response, &hop.url, &path).await {
                    return DownloadOutcome::Failed {
                        task: hop.to_task(&task),
                        error,
                    };
                }

                if let Some(log) = ctx.log {
                    let record = DownloadedFile::new(hop.url.as_str(), task.filename.as_str());
                    if let Err(e) = log.append(&record) {
                        tracing::warn!("Failed to log download of '{}': {}", hop.url, e);
                    }
                }

                return DownloadOutcome::Saved {
                    url: hop.url,
                    path,
                    redirects,
                };
            }

            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER => {
                if redirects >= ctx.max_redirects {
                    let error = CrawlError::RedirectLimit {
                        url: task.url.clone(),
                    };
                    return DownloadOutcome::Failed {
                        task: hop.to_task(&task),
                        error,
                    };
                }

                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok());
                let next = match location {
                    Some(location) => resolve_redirect(&url, location).map_err(|e| e.to_string()),
                    None => Err("redirect without a Location header".to_string()),
                };
                let next = match next {
                    Ok(next) => next,
                    Err(reason) => {
                        let error = CrawlError::MalformedUrl {
                            url: hop.url.clone(),
                            reason,
                        };
                        return DownloadOutcome::Failed {
                            task: hop.to_task(&task),
                            error,
                        };
                    }
                };

                if let Some(cookies) = response_cookies(response.headers()) {
                    hop.cookies = cookies;
                }

                tracing::debug!(
                    "Redirect {} from '{}' to '{}'",
                    response.status().as_u16(),
                    hop.url,
                    next
                );
                hop.referer = std::mem::replace(&mut hop.url, next);
                redirects += 1;
            }

            StatusCode::NOT_FOUND => {
                tracing::warn!("Not found '{}'.", hop.url);
                let error = CrawlError::NotFound {
                    url: hop.url.clone(),
                };
                return DownloadOutcome::Failed {
                    task: hop.to_task(&task),
                    error,
                };
            }

            StatusCode::BAD_REQUEST => {
                let message = server_message(response).await;
                tracing::warn!("Bad request '{}': {}", hop.url, message);
                let error = CrawlError::BadRequest {
                    url: hop.url.clone(),
                    message,
                };
                return DownloadOutcome::Failed {
                    task: hop.to_task(&task),
                    error,
                };
            }

            status => {
                let error = CrawlError::Transient {
                    url: hop.url.clone(),
                    reason: format!("unexpected status {}", status),
                };
                return DownloadOutcome::Failed {
                    task: hop.to_task(&task),
                    error,
                };
            }
        }
    }
}

/// Sends one download request with the fixed header set
async fn send_download_request(
    client: &Client,
    url: &Url,
    hop: &Hop,
    timeout: Duration,
) -> Result<Response, reqwest::Error> {
    let mut request = client
        .get(url.clone())
        .timeout(timeout)
        .header(USER_AGENT, DOWNLOAD_USER_AGENT)
        .header(ACCEPT, "*/*")
        .header(ACCEPT_ENCODING, "identity");

    if let Some(host) = host_header(url) {
        request = request.header(HOST, host);
    }
    if !hop.referer.is_empty() {
        request = request.header(REFERER, hop.referer.as_str());
    }
    if !hop.cookies.is_empty() {
        request = request.header(COOKIE, hop.cookies.as_str());
    }

    request.send().await
}

/// Returns `filename` as a path that stays below the download root
///
/// Absolute paths, drive prefixes and `..` components are rejected; `.`
/// components are dropped.
fn contained_path(filename: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Streams a 200 response body to `path`, replacing any existing file
///
/// A partly written file is removed when the transfer fails.
async fn save_body(response: Response, url: &str, path: &Path) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::Transient {
                url: url.to_string(),
                reason: format!("Failed to create {}: {}", parent.display(), e),
            })?;
    }

    match stream_to_file(response, url, path).await {
        Ok(written) => {
            tracing::debug!("Saved {} bytes to {}", written, path.display());
            Ok(())
        }
        Err(error) => {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!("No partial file to remove at {}: {}", path.display(), e);
            }
            Err(error)
        }
    }
}

/// Copies the body chunk by chunk; returns the number of bytes written
async fn stream_to_file(response: Response, url: &str, path: &Path) -> Result<u64, CrawlError> {
    let transient = |reason: String| CrawlError::Transient {
        url: url.to_string(),
        reason,
    };

    let file = File::create(path)
        .await
        .map_err(|e| transient(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transient(format!("Failed to read body: {}", e)))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| transient(format!("Failed to write {}: {}", path.display(), e)))?;
        written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| transient(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(written)
}

/// Collects the `name=value` pairs set by a response's `Set-Cookie` headers
///
/// Attributes (`Path`, `Domain`, `Expires`, ...) are dropped and no scoping is
/// applied; the pairs replace the carried cookie as-is.
fn response_cookies(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Extracts a short server-provided explanation from an error response
async fn server_message(response: Response) -> String {
    let reason = response
        .status()
        .canonical_reason()
        .unwrap_or("Bad Request")
        .to_string();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();

    if body.is_empty() {
        reason
    } else {
        body.chars().take(MAX_SERVER_MESSAGE).collect()
    }
}

/// Maps a reqwest error to the crawl error taxonomy
fn classify_request_error(url: &str, e: reqwest::Error) -> CrawlError {
    if e.is_builder() {
        CrawlError::MalformedUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else if e.is_timeout() {
        CrawlError::Transient {
            url: url.to_string(),
            reason: "Request timeout".to_string(),
        }
    } else if e.is_connect() {
        CrawlError::Transient {
            url: url.to_string(),
            reason: "Connection failed".to_string(),
        }
    } else {
        CrawlError::Transient {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
