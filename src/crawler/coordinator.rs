//! Crawler coordinator - worker pool and submission API
//!
//! This module ties the pieces together:
//! - Admission through the retry registry
//! - Barrier registration and queueing of admitted tasks
//! - A fixed pool of workers executing crawls and downloads
//! - Retry, failure recording and the drain-then-teardown shutdown

use crate::config::CrawlerSettings;
use crate::crawler::fetcher::{
    build_download_client, build_page_client, download_file, fetch_page, DownloadContext,
    DownloadOutcome,
};
use crate::crawler::parser::parse_page;
use crate::crawler::task::{CrawlTask, DownloadTask, Task};
use crate::handlers::Handler;
use crate::output::{CrawlSummary, DownloadLog};
use crate::state::{CompletionBarrier, FailureCollector, RetryRegistry, TaskKind, FIRST_ATTEMPT};
use crate::url::sanitize_url;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use reqwest::Client;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use url::Url;

type SharedQueue = Arc<tokio::sync::Mutex<UnboundedReceiver<Task>>>;

/// Builder for a [`Crawler`]
///
/// Handlers are consulted in the order they are added.
pub struct CrawlerBuilder {
    settings: CrawlerSettings,
    handlers: Vec<Box<dyn Handler>>,
}

impl CrawlerBuilder {
    pub fn new(settings: CrawlerSettings) -> Self {
        Self {
            settings,
            handlers: Vec::new(),
        }
    }

    /// Appends a handler to the chain
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        tracing::info!("Added handler '{}'.", handler.name());
        self.handlers.push(Box::new(handler));
        self
    }

    /// Builds the crawler and starts its workers
    ///
    /// Must be called from within a tokio runtime. Fails if an HTTP client
    /// cannot be built or the download log cannot be opened.
    pub fn build(self) -> Result<Crawler, CrawlError> {
        let page_client = build_page_client(self.settings.max_redirects)?;
        let download_client = build_download_client()?;
        let download_log = self
            .settings
            .download_log
            .as_deref()
            .map(DownloadLog::open)
            .transpose()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let workers = self.settings.workers.max(1);

        let crawler = Crawler {
            shared: Arc::new(Shared {
                settings: self.settings,
                handlers: self.handlers,
                page_client,
                download_client,
                download_log,
                registry: RetryRegistry::new(),
                barrier: CompletionBarrier::new(),
                failed_crawls: FailureCollector::new(),
                failed_downloads: FailureCollector::new(),
                saved: AtomicUsize::new(0),
                queue: Mutex::new(Some(sender)),
                workers: Mutex::new(Vec::new()),
                started_at: Utc::now(),
            }),
        };

        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(receiver));
        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, Arc::downgrade(&crawler.shared), Arc::clone(&queue))))
            .collect();
        *crawler
            .shared
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = handles;

        tracing::info!("Started {} workers", workers);
        Ok(crawler)
    }
}

struct Shared {
    settings: CrawlerSettings,
    handlers: Vec<Box<dyn Handler>>,
    page_client: Client,
    download_client: Client,
    download_log: Option<DownloadLog>,
    registry: RetryRegistry,
    barrier: CompletionBarrier,
    failed_crawls: FailureCollector,
    failed_downloads: FailureCollector,
    saved: AtomicUsize,
    /// Taken at shutdown; closing it stops the workers
    queue: Mutex<Option<UnboundedSender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started_at: DateTime<Utc>,
}

/// Handle to a running crawl and download orchestrator
///
/// Cloning is cheap; all clones share the same pool, registry and barrier.
/// Submissions never wait for the work itself: they return whether the task
/// was admitted and queued.
///
/// Workers only hold a weak reference. Dropping every handle without calling
/// [`Crawler::shutdown`] stops the pool and abandons queued work; call
/// `shutdown` to wait for it.
///
/// # Example
///
/// ```no_run
/// use crawldown::{CrawlerBuilder, CrawlerSettings};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), crawldown::CrawlError> {
/// let crawler = CrawlerBuilder::new(CrawlerSettings::new(3, "downloads")).build()?;
/// crawler.download(
///     "https://example.com/paper.pdf",
///     "papers/paper.pdf",
///     "",
///     "",
///     Duration::from_secs(30),
///     2,
/// );
/// let summary = crawler.shutdown().await;
/// println!("{} downloaded", summary.downloaded);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Crawler {
    shared: Arc<Shared>,
}

impl Crawler {
    /// Submits a page crawl for a URL not seen before
    pub fn crawl(&self, url: &str, timeout: Duration, max_tries: u32) -> bool {
        self.submit_crawl(url, timeout, max_tries, FIRST_ATTEMPT)
    }

    /// Submits another attempt of a page crawl, bounded by `max_tries`
    pub fn retry_crawl(&self, url: &str, timeout: Duration, max_tries: u32) -> bool {
        self.submit_crawl(url, timeout, max_tries, max_tries)
    }

    /// Submits a download for a URL not seen before
    ///
    /// `filename` is relative to the download root; `referer` and `cookies`
    /// are sent with the first request when non-empty.
    pub fn download(
        &self,
        url: &str,
        filename: &str,
        referer: &str,
        cookies: &str,
        timeout: Duration,
        max_tries: u32,
    ) -> bool {
        let task = DownloadTask {
            url: sanitize_url(url),
            filename: filename.to_string(),
            referer: referer.to_string(),
            cookies: cookies.to_string(),
            timeout,
            max_tries,
        };
        self.submit_download(task, FIRST_ATTEMPT)
    }

    /// Submits another attempt of a download, bounded by `max_tries`
    pub fn retry_download(
        &self,
        url: &str,
        filename: &str,
        referer: &str,
        cookies: &str,
        timeout: Duration,
        max_tries: u32,
    ) -> bool {
        let task = DownloadTask {
            url: sanitize_url(url),
            filename: filename.to_string(),
            referer: referer.to_string(),
            cookies: cookies.to_string(),
            timeout,
            max_tries,
        };
        self.submit_download(task, max_tries)
    }

    /// Number of attempts admitted so far for a crawl URL
    pub fn crawl_attempts(&self, url: &str) -> u32 {
        self.shared
            .registry
            .attempts(TaskKind::Crawl, &sanitize_url(url))
    }

    /// Number of attempts admitted so far for a download URL
    pub fn download_attempts(&self, url: &str) -> u32 {
        self.shared
            .registry
            .attempts(TaskKind::Download, &sanitize_url(url))
    }

    /// Number of admitted tasks that have not finished executing
    pub fn outstanding(&self) -> usize {
        self.shared.barrier.outstanding()
    }

    /// Waits for all outstanding work, then stops the workers
    ///
    /// Work spawned by retries while waiting is waited for as well. The
    /// summary is logged and returned. Must not be called from inside a
    /// handler: the calling task would wait for itself.
    pub async fn shutdown(&self) -> CrawlSummary {
        tracing::warn!("Waiting for all jobs to complete ...");
        self.shared.barrier.wait_for_drain().await;

        let summary = self.summary();
        summary.log();

        // Dropping the only sender ends every worker loop.
        drop(
            self.shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers = std::mem::take(
            &mut *self
                .shared
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker terminated abnormally: {}", e);
            }
        }

        if let Some(log) = &self.shared.download_log {
            if let Err(e) = log.close() {
                tracing::warn!(
                    "Failed to close download log '{}': {}",
                    log.path().display(),
                    e
                );
            }
        }

        summary
    }

    /// Builds a summary of the outcomes so far
    pub fn summary(&self) -> CrawlSummary {
        let shared = &self.shared;
        CrawlSummary::from_counts(
            shared.started_at,
            shared.registry.url_count(TaskKind::Crawl),
            shared.failed_crawls.snapshot(),
            shared.saved.load(Ordering::SeqCst),
            shared.failed_downloads.snapshot(),
        )
    }

    fn submit_crawl(&self, url: &str, timeout: Duration, max_tries: u32, bound: u32) -> bool {
        let url = sanitize_url(url);
        if !self.shared.registry.try_admit(TaskKind::Crawl, &url, bound) {
            return false;
        }
        self.enqueue(Task::Crawl(CrawlTask {
            url,
            timeout,
            max_tries,
        }))
    }

    fn submit_download(&self, task: DownloadTask, bound: u32) -> bool {
        if !self
            .shared
            .registry
            .try_admit(TaskKind::Download, &task.url, bound)
        {
            return false;
        }
        self.enqueue(Task::Download(task))
    }

    /// Registers `task` with the barrier and queues it
    fn enqueue(&self, task: Task) -> bool {
        self.shared.barrier.register();

        let sent = {
            let queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match queue.as_ref() {
                Some(sender) => {
                    match &task {
                        Task::Crawl(crawl) => tracing::info!("Queued URL '{}'.", crawl.url),
                        Task::Download(download) => {
                            tracing::info!("Queued URL '{}'({}).", download.url, download.filename)
                        }
                    }
                    sender.send(task).map_err(|rejected| rejected.0)
                }
                None => Err(task),
            }
        };

        match sent {
            Ok(()) => true,
            Err(task) => {
                tracing::warn!("Crawler is shut down, dropping '{}'", task.url());
                self.shared.barrier.arrive();
                false
            }
        }
    }

    /// Executes one task; arrival is reported by the caller
    async fn execute(&self, task: Task) {
        match task {
            Task::Crawl(task) => self.crawl_url(task).await,
            Task::Download(task) => self.download_url(task).await,
        }
    }

    async fn crawl_url(&self, task: CrawlTask) {
        tracing::info!("Crawling '{}'...", task.url);

        match fetch_page(&self.shared.page_client, &task).await {
            Ok((final_url, body)) => match self.dispatch(&task.url, final_url, &body) {
                Some(name) => tracing::debug!("[{}] Handled '{}'.", name, task.url),
                None => tracing::debug!("No handler accepted '{}'.", task.url),
            },
            Err(CrawlError::MalformedUrl { url, reason }) => {
                tracing::warn!("Invalid URL '{}': {}", url, reason);
            }
            Err(error) => {
                tracing::warn!("Failed to crawl '{}': {}", task.url, error);
                if !self.retry_crawl(&task.url, task.timeout, task.max_tries) {
                    tracing::warn!("{}", CrawlError::Exhausted { url: task.url.clone() });
                    self.shared.failed_crawls.record(task.url);
                }
            }
        }
    }

    /// Hands a fetched page to the handler chain; returns the accepting handler
    ///
    /// Kept synchronous: the parsed document must not live across an await.
    fn dispatch(&self, url: &str, final_url: Url, body: &str) -> Option<String> {
        let page = parse_page(body, final_url);
        self.shared
            .handlers
            .iter()
            .find(|handler| handler.handle(url, &page, self))
            .map(|handler| handler.name().to_string())
    }

    async fn download_url(&self, task: DownloadTask) {
        let ctx = DownloadContext {
            client: &self.shared.download_client,
            download_root: &self.shared.settings.download_root,
            max_redirects: self.shared.settings.max_redirects,
            log: self.shared.download_log.as_ref(),
        };

        match download_file(&ctx, task).await {
            DownloadOutcome::Saved {
                url,
                path,
                redirects,
            } => {
                self.shared.saved.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    "Downloaded '{}' to {} ({} redirects)",
                    url,
                    path.display(),
                    redirects
                );
            }
            DownloadOutcome::Failed { task, error } if error.is_transient() => {
                tracing::warn!("Failed to download '{}': {}", task.url, error);
                if !self.retry_download(
                    &task.url,
                    &task.filename,
                    &task.referer,
                    &task.cookies,
                    task.timeout,
                    task.max_tries,
                ) {
                    tracing::warn!("{}", CrawlError::Exhausted { url: task.url.clone() });
                    self.shared.failed_downloads.record(task.url);
                }
            }
            DownloadOutcome::Failed { task, error } => {
                tracing::warn!("Failed to download '{}': {}", task.url, error);
                if error.is_recorded() {
                    self.shared.failed_downloads.record(task.url);
                }
            }
        }
    }
}

/// Pulls tasks off the shared queue until it is closed
///
/// Every task arrives at the barrier exactly once, even when a handler
/// panics; the worker then carries on with the next task.
async fn worker_loop(id: usize, weak: Weak<Shared>, queue: SharedQueue) {
    tracing::debug!("Worker {} started", id);
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };
        let Some(shared) = weak.upgrade() else {
            break;
        };

        let crawler = Crawler { shared };
        let url = task.url().to_string();
        if let Err(panic) = AssertUnwindSafe(crawler.execute(task))
            .catch_unwind()
            .await
        {
            tracing::error!(
                "Worker {} panicked on '{}': {}",
                id,
                url,
                panic_message(panic.as_ref())
            );
        }
        crawler.shared.barrier.arrive();
    }
    tracing::debug!("Worker {} stopped", id);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
