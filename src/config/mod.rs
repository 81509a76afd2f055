//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use crawldown::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawldown.toml")).unwrap();
//! println!("Downloading into: {}", config.crawler.download_root);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, CrawlerSettings, DefaultsConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
