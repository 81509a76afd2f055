//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RetryRegistry`: per-URL attempt counters deciding admission
//! - `CompletionBarrier`: outstanding-work counter that shutdown waits on
//! - `FailureCollector`: URLs that failed permanently

mod barrier;
mod failures;
mod registry;

// Re-export main types
pub use barrier::CompletionBarrier;
pub use failures::FailureCollector;
pub use registry::{RetryRegistry, TaskKind, FIRST_ATTEMPT};
