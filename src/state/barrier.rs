use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Dynamic join barrier over outstanding task units
///
/// Unlike a fixed-count latch, units can be registered while a waiter is
/// already parked. A retry must register its replacement before the unit it
/// replaces arrives, otherwise the count could touch zero in between.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: AtomicUsize,
    drained: Notify,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more unit of work; call before the unit is queued
    pub fn register(&self) {
        let previous = self.outstanding.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Barrier registered unit ({} outstanding)", previous + 1);
    }

    /// Marks one unit of work as finished
    pub fn arrive(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "arrive() without matching register()");
        tracing::trace!("Barrier unit arrived ({} outstanding)", previous - 1);
        if previous == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Returns the number of registered units that have not arrived
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Waits until no registered unit is outstanding
    pub async fn wait_for_drain(&self) {
        loop {
            // Created before the check so a concurrent notify_waiters() is not lost.
            let notified = self.drained.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
