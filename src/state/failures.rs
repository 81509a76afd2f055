use std::sync::{Mutex, PoisonError};

/// Append-only list of URLs that failed permanently
#[derive(Debug, Default)]
pub struct FailureCollector {
    urls: Mutex<Vec<String>>,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a permanently failed URL
    pub fn record(&self, url: impl Into<String>) {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.into());
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the recorded URLs in recording order
    pub fn snapshot(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
