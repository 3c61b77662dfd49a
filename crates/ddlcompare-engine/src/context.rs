//! Per-run state
//!
//! Created at the start of a run and dropped at the end. Nothing here is
//! process-global.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    cancel: watch::Receiver<bool>,
    dispatched: AtomicUsize,
}

impl RunContext {
    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            cancel,
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// A receiver for waiting on cancellation
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Items handed to a worker so far
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let (_tx, rx) = watch::channel(false);
        let a = RunContext::new(rx.clone());
        let b = RunContext::new(rx);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_cancellation_and_dispatch_count() {
        let (tx, rx) = watch::channel(false);
        let context = RunContext::new(rx);
        assert!(!context.is_cancelled());

        context.record_dispatch();
        context.record_dispatch();
        assert_eq!(context.dispatched(), 2);

        tx.send(true).unwrap();
        assert!(context.is_cancelled());
    }
}
