//! JSON-lines record of completed downloads

use crate::CrawlError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// One successfully downloaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    /// The URL the file was finally served from
    pub url: String,

    /// The file name relative to the download root
    pub file: String,
}

impl DownloadedFile {
    pub fn new(url: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file: file.into(),
        }
    }

    /// Serializes the record as a single JSON line (without the newline)
    pub fn to_json(&self) -> Result<String, CrawlError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a record from one JSON line
    pub fn from_json(line: &str) -> Result<Self, CrawlError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Append-only download log shared by all workers
///
/// Each record is written as one line and flushed immediately, so a crash
/// loses at most the record being written.
#[derive(Debug)]
pub struct DownloadLog {
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl DownloadLog {
    /// Opens (or creates) the log in append mode
    pub fn open(path: &Path) -> Result<Self, CrawlError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record
    ///
    /// Appending to a closed log is a no-op.
    pub fn append(&self, record: &DownloadedFile) -> Result<(), CrawlError> {
        let line = record.to_json()?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = writer.as_mut() {
            writeln!(file, "{}", line)?;
            file.flush()?;
        } else {
            tracing::warn!(
                "Download log '{}' is closed, dropping record for '{}'",
                self.path.display(),
                record.url
            );
        }
        Ok(())
    }

    /// Flushes and closes the log
    pub fn close(&self) -> Result<(), CrawlError> {
        let file = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(file) = file {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Reads every record from a download log
pub fn read_download_log(path: &Path) -> Result<Vec<DownloadedFile>, CrawlError> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(DownloadedFile::from_json)
        .collect()
}
