//! Debounced commit scheduling
//!
//! At most one commit timer is pending per scheduler. Arming a new timer
//! cancels the previous one, so a burst of edits collapses into a single
//! commit fired `delay` after the last edit. Dropping the scheduler (or
//! calling [`CommitScheduler::shutdown`]) cancels everything, so no timer
//! fires after the owning binding is gone.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::lock;

struct Pending {
    id: u64,
    token: CancellationToken,
}

pub struct CommitScheduler {
    root: CancellationToken,
    pending: Arc<Mutex<Option<Pending>>>,
    counter: AtomicU64,
}

impl CommitScheduler {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            pending: Arc::new(Mutex::new(None)),
            counter: AtomicU64::new(0),
        }
    }

    /// Arm a timer that runs `job` after `delay`, replacing any pending one
    pub fn schedule<F>(&self, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.root.is_cancelled() {
            return;
        }

        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.root.child_token();

        if let Some(previous) = lock(&self.pending).replace(Pending {
            id,
            token: token.clone(),
        }) {
            trace!(replaced = previous.id, timer = id, "Restarting commit timer");
            previous.token.cancel();
        }

        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            // Only the timer that still owns the slot may fire
            {
                let mut slot = lock(&pending);
                match slot.as_ref() {
                    Some(current) if current.id == id => {
                        *slot = None;
                    }
                    _ => return,
                }
            }

            trace!(timer = id, "Commit timer fired");
            job.await;
        });
    }

    /// Cancel the pending timer so the caller can commit immediately
    ///
    /// Returns whether a timer was pending.
    pub fn flush(&self) -> bool {
        self.take_pending()
    }

    /// Cancel the pending timer without committing
    pub fn cancel(&self) {
        self.take_pending();
    }

    fn take_pending(&self) -> bool {
        match lock(&self.pending).take() {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Cancel the pending timer and refuse any further scheduling
    pub fn shutdown(&self) {
        self.root.cancel();
        lock(&self.pending).take();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Default for CommitScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommitScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
