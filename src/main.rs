//! Crawldown main entry point
//!
//! This is the command-line interface for crawling book sites and downloading
//! their PDFs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crawldown::config::{load_config_with_hash, Config};
use crawldown::handlers::{pdfdrive, springer, PdfdriveHandler, SpringerHandler};
use crawldown::{CrawlerBuilder, CrawlerSettings};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Crawldown: crawl book sites and download their PDFs
#[derive(Parser, Debug)]
#[command(name = "crawldown")]
#[command(version)]
#[command(about = "Concurrent crawler and downloader", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Number of workers (overrides the config file)
    #[arg(short = 'n', long, value_name = "N", global = true)]
    workers: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    site: Site,
}

#[derive(Subcommand, Debug)]
enum Site {
    /// Download the free Springer machine learning books
    Springer {
        /// Directory to download into
        #[arg(short = 'd', long, value_name = "DIR")]
        download_root: Option<PathBuf>,

        /// JSON-lines log of downloaded files
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,
    },

    /// Download books from PDF Drive categories, tags and searches
    Pdfdrive {
        /// Directory to download into
        #[arg(short = 'd', long, value_name = "DIR")]
        download_root: Option<PathBuf>,

        /// JSON-lines log of downloaded files
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,

        /// Categories to crawl
        #[arg(short = 'c', long = "category", value_name = "CATEGORY", num_args = 1..)]
        categories: Vec<String>,

        /// Tags to crawl
        #[arg(short = 't', long = "tag", value_name = "TAG", num_args = 1..)]
        tags: Vec<String>,

        /// Search queries to crawl
        #[arg(short = 'q', long = "query", value_name = "QUERY", num_args = 1..)]
        queries: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Some(config)
        }
        None => None,
    };

    let mut settings = config
        .as_ref()
        .map(CrawlerSettings::from)
        .unwrap_or_else(|| CrawlerSettings::from(&Config::default()));
    if let Some(workers) = cli.workers {
        settings.workers = workers.max(1);
    }
    // Handlers keep their own limits unless a config file says otherwise.
    let limits = config
        .as_ref()
        .map(|_| (settings.default_timeout, settings.default_max_tries));

    match cli.site {
        Site::Springer {
            download_root,
            log_file,
        } => {
            apply_paths(&mut settings, download_root, log_file);
            run_springer(settings, limits).await
        }
        Site::Pdfdrive {
            download_root,
            log_file,
            categories,
            tags,
            queries,
        } => {
            apply_paths(&mut settings, download_root, log_file);
            run_pdfdrive(settings, limits, &categories, &tags, &queries).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawldown=info,warn"),
            1 => EnvFilter::new("crawldown=debug,info"),
            2 => EnvFilter::new("crawldown=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_paths(
    settings: &mut CrawlerSettings,
    download_root: Option<PathBuf>,
    log_file: Option<PathBuf>,
) {
    if let Some(root) = download_root {
        settings.download_root = root;
    }
    if let Some(log) = log_file {
        settings.download_log = Some(log);
    }
}

async fn run_springer(
    settings: CrawlerSettings,
    limits: Option<(Duration, u32)>,
) -> anyhow::Result<()> {
    let mut handler = SpringerHandler::new();
    if let Some((timeout, max_tries)) = limits {
        handler = handler.with_limits(timeout, max_tries);
    }
    let (timeout, max_tries) = limits.unwrap_or((springer::TIMEOUT, springer::MAX_TRIES));
    let index_url = handler.index_url().to_string();

    let crawler = CrawlerBuilder::new(settings)
        .handler(handler)
        .build()
        .context("Failed to start crawler")?;
    crawler.crawl(&index_url, timeout, max_tries);
    crawler.shutdown().await;
    Ok(())
}

async fn run_pdfdrive(
    settings: CrawlerSettings,
    limits: Option<(Duration, u32)>,
    categories: &[String],
    tags: &[String],
    queries: &[String],
) -> anyhow::Result<()> {
    let mut handler = PdfdriveHandler::new();
    if let Some((timeout, max_tries)) = limits {
        handler = handler.with_limits(timeout, max_tries);
    }
    let (timeout, max_tries) = limits.unwrap_or((pdfdrive::TIMEOUT, pdfdrive::MAX_TRIES));

    let seeds: Vec<String> = categories
        .iter()
        .map(|c| handler.category_url(c))
        .chain(tags.iter().map(|t| handler.tag_url(t)))
        .chain(queries.iter().map(|q| handler.search_url(q)))
        .collect();
    if seeds.is_empty() {
        tracing::warn!("Nothing to crawl: pass --category, --tag or --query");
    }

    let crawler = CrawlerBuilder::new(settings)
        .handler(handler)
        .build()
        .context("Failed to start crawler")?;
    for seed in &seeds {
        crawler.crawl(seed, timeout, max_tries);
    }
    crawler.shutdown().await;
    Ok(())
}
