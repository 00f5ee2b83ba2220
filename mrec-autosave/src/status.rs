//! Save-status reporting
//!
//! `idle -> saving` when a commit is armed or dispatched, `saving -> saved`
//! on success (reverting to `idle` after the display interval unless
//! something newer happened), `saving -> error` on failure. A fresh edit
//! clears a lingering `saved` or `error` back to `idle`.

use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

use crate::lock;

/// Visible save state of one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

/// Publishes a binding's [`SaveStatus`] through a watch channel
pub struct StatusReporter {
    tx: watch::Sender<SaveStatus>,
    /// Bumped on every transition; the saved->idle revert only applies if
    /// nothing else happened since
    generation: Mutex<u64>,
    saved_display: Duration,
}

impl StatusReporter {
    pub fn new(saved_display: Duration) -> Arc<Self> {
        let (tx, _) = watch::channel(SaveStatus::Idle);
        Arc::new(Self {
            tx,
            generation: Mutex::new(0),
            saved_display,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SaveStatus {
        *self.tx.borrow()
    }

    fn transition(&self, status: SaveStatus) -> u64 {
        let mut generation = lock(&self.generation);
        *generation += 1;
        let previous = self.tx.send_replace(status);
        if previous != status {
            trace!(?previous, ?status, "Save status changed");
        }
        *generation
    }

    pub fn mark_saving(&self) {
        self.transition(SaveStatus::Saving);
    }

    pub fn mark_error(&self) {
        self.transition(SaveStatus::Error);
    }

    pub fn mark_idle(&self) {
        self.transition(SaveStatus::Idle);
    }

    /// New edit arrived: drop a lingering `saved` / `error`
    pub fn reset_for_edit(&self) {
        if matches!(self.current(), SaveStatus::Saved | SaveStatus::Error) {
            self.transition(SaveStatus::Idle);
        }
    }

    /// Enter `saved` and schedule the revert to `idle`
    pub fn mark_saved(self: &Arc<Self>) {
        let generation = self.transition(SaveStatus::Saved);
        let reporter: Weak<Self> = Arc::downgrade(self);
        let delay = self.saved_display;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(reporter) = reporter.upgrade() {
                reporter.revert_saved(generation);
            }
        });
    }

    fn revert_saved(&self, expected_generation: u64) {
        let mut generation = lock(&self.generation);
        if *generation == expected_generation && *self.tx.borrow() == SaveStatus::Saved {
            *generation += 1;
            self.tx.send_replace(SaveStatus::Idle);
        }
    }
}
