use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Bound used for a URL's first submission
///
/// The first admission of a URL always succeeds, so any bound works; zero
/// makes a second "first" submission of the same URL fail.
pub const FIRST_ATTEMPT: u32 = 0;

/// Which attempt namespace a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Crawl,
    Download,
}

#[derive(Debug, Default)]
struct Counters {
    crawls: HashMap<String, u32>,
    downloads: HashMap<String, u32>,
}

impl Counters {
    fn map_mut(&mut self, kind: TaskKind) -> &mut HashMap<String, u32> {
        match kind {
            TaskKind::Crawl => &mut self.crawls,
            TaskKind::Download => &mut self.downloads,
        }
    }

    fn map(&self, kind: TaskKind) -> &HashMap<String, u32> {
        match kind {
            TaskKind::Crawl => &self.crawls,
            TaskKind::Download => &self.downloads,
        }
    }
}

/// Deduplicating attempt counter for crawl and download URLs
///
/// Counts only grow and entries are never removed, so the registry alone
/// tells how many attempts every URL has been given.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    counters: Mutex<Counters>,
}

impl RetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits another attempt for `url` if its count is below `bound`
    ///
    /// An unseen URL is always admitted with a count of 1, whatever the bound.
    /// A seen URL is admitted (and its count incremented) only while its count
    /// is below `bound`.
    ///
    /// # Examples
    ///
    /// ```
    /// use crawldown::state::{RetryRegistry, TaskKind, FIRST_ATTEMPT};
    ///
    /// let registry = RetryRegistry::new();
    /// assert!(registry.try_admit(TaskKind::Crawl, "https://a.com/", FIRST_ATTEMPT));
    /// assert!(!registry.try_admit(TaskKind::Crawl, "https://a.com/", FIRST_ATTEMPT));
    /// assert!(registry.try_admit(TaskKind::Crawl, "https://a.com/", 2));
    /// assert!(!registry.try_admit(TaskKind::Crawl, "https://a.com/", 2));
    /// ```
    pub fn try_admit(&self, kind: TaskKind, url: &str, bound: u32) -> bool {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let map = counters.map_mut(kind);

        match map.get_mut(url) {
            None => {
                map.insert(url.to_string(), 1);
                true
            }
            Some(count) if *count >= bound => false,
            Some(count) => {
                *count += 1;
                true
            }
        }
    }

    /// Returns the number of attempts admitted so far for `url`
    pub fn attempts(&self, kind: TaskKind, url: &str) -> u32 {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.map(kind).get(url).copied().unwrap_or(0)
    }

    /// Returns the number of distinct URLs ever admitted
    pub fn url_count(&self, kind: TaskKind) -> usize {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.map(kind).len()
    }
}
