use crate::config::types::{Config, CrawlerConfig, DefaultsConfig};
use crate::ConfigError;

const MAX_WORKERS: u32 = 256;
const MAX_REDIRECTS: u32 = 50;
const MIN_TIMEOUT_MS: u64 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_defaults_config(&config.defaults)?;
    Ok(())
}

/// Validates worker pool and download configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_redirects < 1 || config.max_redirects > MAX_REDIRECTS {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be between 1 and {}, got {}",
            MAX_REDIRECTS, config.max_redirects
        )));
    }

    if config.download_root.is_empty() {
        return Err(ConfigError::InvalidPath(
            "download_root cannot be empty".to_string(),
        ));
    }

    if let Some(log) = &config.download_log {
        if log.ends_with('/') {
            return Err(ConfigError::InvalidPath(format!(
                "download_log must name a file, got '{}'",
                log
            )));
        }
    }

    Ok(())
}

/// Validates per-submission defaults
fn validate_defaults_config(config: &DefaultsConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < MIN_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "timeout_ms must be >= {}ms, got {}ms",
            MIN_TIMEOUT_MS, config.timeout_ms
        )));
    }

    if config.max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_tries must be >= 1, got {}",
            config.max_tries
        )));
    }

    Ok(())
}
