//! Cooperative task scheduling
//!
//! The engine defers work in exactly three shapes: an idle task per device
//! for the auto-activation decider, one idle task for fleet-wide
//! re-checks, and one timer for the retry-counter reset. All of them
//! resolve to a [`PolicyEvent`] re-entering the engine's queue, so the
//! engine itself never yields mid-handler.

use crate::events::PolicyEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a deferred task
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Cancels the task if it has not fired yet
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

/// Deferred-task scheduler
pub trait TaskScheduler: Send + Sync {
    /// Runs `event` once the current event batch has settled
    fn schedule_idle(&self, event: PolicyEvent) -> TaskHandle;

    /// Runs `event` after `delay`
    fn schedule_after(&self, delay: Duration, event: PolicyEvent) -> TaskHandle;
}

/// Scheduler backed by the ambient tokio runtime
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<PolicyEvent>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<PolicyEvent>) -> Self {
        Self { tx }
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule_idle(&self, event: PolicyEvent) -> TaskHandle {
        let tx = self.tx.clone();
        TaskHandle::new(tokio::spawn(async move {
            // One yield lets already-queued events drain first.
            tokio::task::yield_now().await;
            let _ = tx.send(event);
        }))
    }

    fn schedule_after(&self, delay: Duration, event: PolicyEvent) -> TaskHandle {
        let tx = self.tx.clone();
        TaskHandle::new(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        }))
    }
}
