//! Field binding: one editable field tied to one `(table, column, record)`
//!
//! # State
//!
//! - `value`: what the user sees; set optimistically on every edit
//! - `saved_value`: last value the store confirmed
//! - `latest_seq`: sequence number of the most recently dispatched commit
//!
//! Only the response to the latest dispatched commit may confirm or roll
//! back. Older responses are discarded, so a slow failure can never clobber
//! a newer success. After teardown every response is discarded.
//!
//! A discarded success may still have been written. `saved_value` therefore
//! can lag the store: if the latest commit then fails, the field rolls back
//! to the value confirmed before that discarded write, not to what the store
//! now holds. Callers that need the stored value should refetch on the
//! invalidation the failed commit publishes.

use mrec_common::config::{AutosaveConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_SAVED_DISPLAY_MS};
use mrec_common::events::{EventBus, RecordEvent};
use mrec_common::store::RecordStore;
use mrec_common::{AuthProvider, Error};
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::lock;
use crate::mutator::{MutationReport, ParentDefaults, PersistenceMutator, ValueTransform};
use crate::record_id::RecordId;
use crate::scheduler::CommitScheduler;
use crate::status::{SaveStatus, StatusReporter};

/// Values a binding can hold
pub trait FieldValue: Clone + PartialEq + Serialize + Send + Sync + 'static {}

impl<T> FieldValue for T where T: Clone + PartialEq + Serialize + Send + Sync + 'static {}

/// When an edit is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Text input: commit once the user pauses for this long
    Debounced(Duration),
    /// Selects and date pickers: commit on every change
    Immediate,
}

impl Default for CommitMode {
    fn default() -> Self {
        CommitMode::Debounced(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

/// Lifecycle callbacks, all optional
pub trait BindingObserver<V>: Send + Sync {
    fn on_success(&self, _value: &V) {}

    fn on_error(&self, _error: &Error) {}

    /// The temporary record was created under `record_id`
    fn on_create_success(&self, _record_id: &str) {}
}

struct NoopObserver;

impl<V> BindingObserver<V> for NoopObserver {}

struct FieldState<V> {
    value: V,
    saved_value: V,
    latest_seq: u64,
    in_flight: usize,
    torn_down: bool,
}

struct Inner<V: FieldValue> {
    state: Mutex<FieldState<V>>,
    mutator: PersistenceMutator<V>,
    scheduler: CommitScheduler,
    status: Arc<StatusReporter>,
    observer: Arc<dyn BindingObserver<V>>,
    events: Option<EventBus>,
    mode: CommitMode,
}

pub struct BindingBuilder<V: FieldValue> {
    mutator: PersistenceMutator<V>,
    initial: V,
    mode: CommitMode,
    observer: Arc<dyn BindingObserver<V>>,
    events: Option<EventBus>,
    saved_display: Duration,
}

impl<V: FieldValue> BindingBuilder<V> {
    pub fn mode(mut self, mode: CommitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Column values for the first create only
    pub fn parent_defaults(mut self, defaults: ParentDefaults) -> Self {
        self.mutator = self.mutator.with_parent_defaults(defaults);
        self
    }

    pub fn transform(mut self, transform: ValueTransform<V>) -> Self {
        self.mutator = self.mutator.with_transform(transform);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn BindingObserver<V>>) -> Self {
        self.observer = observer;
        self
    }

    /// Publish invalidations and promotions on this bus
    pub fn events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// How long `saved` is shown before reverting to `idle`
    pub fn saved_display(mut self, interval: Duration) -> Self {
        self.saved_display = interval;
        self
    }

    /// Apply configured timings
    ///
    /// Replaces the debounce window of a debounced binding; an immediate
    /// binding stays immediate.
    pub fn timings(mut self, config: &AutosaveConfig) -> Self {
        if let CommitMode::Debounced(_) = self.mode {
            self.mode = CommitMode::Debounced(config.debounce());
        }
        self.saved_display = config.saved_display();
        self
    }

    pub fn build(self) -> FieldBinding<V> {
        FieldBinding {
            inner: Arc::new(Inner {
                state: Mutex::new(FieldState {
                    value: self.initial.clone(),
                    saved_value: self.initial,
                    latest_seq: 0,
                    in_flight: 0,
                    torn_down: false,
                }),
                mutator: self.mutator,
                scheduler: CommitScheduler::new(),
                status: StatusReporter::new(self.saved_display),
                observer: self.observer,
                events: self.events,
                mode: self.mode,
            }),
        }
    }
}

/// One editable field with optimistic, debounced auto-save
///
/// Dropping the binding tears it down: a pending debounced commit never
/// fires and responses still in flight are ignored.
pub struct FieldBinding<V: FieldValue> {
    inner: Arc<Inner<V>>,
}

impl<V: FieldValue> FieldBinding<V> {
    pub fn builder(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        table: impl Into<String>,
        column: impl Into<String>,
        record_id: RecordId,
        initial: V,
    ) -> BindingBuilder<V> {
        BindingBuilder {
            mutator: PersistenceMutator::new(store, auth, table, column, record_id),
            initial,
            mode: CommitMode::default(),
            observer: Arc::new(NoopObserver),
            events: None,
            saved_display: Duration::from_millis(DEFAULT_SAVED_DISPLAY_MS),
        }
    }

    /// Apply an edit locally and request a commit
    pub fn handle_change(&self, value: V) {
        {
            let mut state = lock(&self.inner.state);
            if state.torn_down {
                return;
            }
            if value != state.saved_value {
                self.inner.status.reset_for_edit();
            }
            state.value = value;
        }

        match self.inner.mode {
            CommitMode::Debounced(delay) => {
                self.inner.status.mark_saving();
                let weak = Arc::downgrade(&self.inner);
                self.inner.scheduler.schedule(delay, commit_weak(weak));
            }
            CommitMode::Immediate => {
                tokio::spawn(Inner::commit_current(Arc::clone(&self.inner)));
            }
        }
    }

    /// Focus left the field: commit a pending debounced edit now
    pub fn handle_blur(&self) {
        if self.inner.scheduler.flush() {
            debug!(
                table = %self.inner.mutator.table(),
                column = %self.inner.mutator.column(),
                "Flushing pending commit on blur"
            );
            tokio::spawn(Inner::commit_current(Arc::clone(&self.inner)));
        }
    }

    pub fn value(&self) -> V {
        lock(&self.inner.state).value.clone()
    }

    pub fn saved_value(&self) -> V {
        lock(&self.inner.state).saved_value.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        let state = lock(&self.inner.state);
        state.value != state.saved_value
    }

    /// A commit has been dispatched and not yet answered
    pub fn is_updating(&self) -> bool {
        lock(&self.inner.state).in_flight > 0
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Current record identity; waits for an in-flight create
    pub async fn record_id(&self) -> RecordId {
        self.inner.mutator.record_id().await
    }

    pub fn table(&self) -> &str {
        self.inner.mutator.table()
    }

    pub fn column(&self) -> &str {
        self.inner.mutator.column()
    }

    /// Cancel the pending commit and ignore in-flight responses
    pub fn teardown(&self) {
        lock(&self.inner.state).torn_down = true;
        self.inner.scheduler.shutdown();
    }
}

impl<V: FieldValue> Drop for FieldBinding<V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn commit_weak<V: FieldValue>(inner: Weak<Inner<V>>) {
    if let Some(inner) = inner.upgrade() {
        Inner::commit_current(inner).await;
    }
}

impl<V: FieldValue> Inner<V> {
    async fn commit_current(self: Arc<Self>) {
        let (seq, value, rollback_to) = {
            let mut state = lock(&self.state);
            if state.torn_down {
                return;
            }
            state.latest_seq += 1;
            state.in_flight += 1;
            (
                state.latest_seq,
                state.value.clone(),
                state.saved_value.clone(),
            )
        };

        self.status.mark_saving();
        let report = self.mutator.commit(&value).await;
        self.publish(&report);

        let is_latest = {
            let mut state = lock(&self.state);
            state.in_flight -= 1;
            if state.torn_down {
                debug!(seq, "Ignoring response for torn-down binding");
                return;
            }
            let is_latest = seq == state.latest_seq;
            if is_latest {
                match &report.result {
                    Ok(_) => state.saved_value = value.clone(),
                    Err(_) => {
                        state.value = rollback_to.clone();
                        state.saved_value = rollback_to;
                    }
                }
            } else {
                debug!(seq, latest = state.latest_seq, "Discarding stale commit response");
            }
            is_latest
        };

        if let Some(promotion) = &report.created {
            self.observer.on_create_success(&promotion.record_id);
        }

        if !is_latest {
            return;
        }

        match report.result {
            Ok(_) => {
                // A newer edit is already waiting on the timer
                if !self.scheduler.has_pending() {
                    self.status.mark_saved();
                }
                self.observer.on_success(&value);
            }
            Err(e) => {
                warn!(
                    table = %self.mutator.table(),
                    column = %self.mutator.column(),
                    error = %e,
                    "Save failed; reverted to last confirmed value"
                );
                self.scheduler.cancel();
                self.status.mark_error();
                self.observer.on_error(&e);
            }
        }
    }

    fn publish(&self, report: &MutationReport) {
        let Some(bus) = &self.events else {
            return;
        };

        bus.invalidate_all(&report.invalidations, report.user_id.as_ref());

        if let Some(promotion) = &report.created {
            bus.emit_lossy(RecordEvent::RecordPromoted {
                table: self.mutator.table().to_string(),
                temporary_id: promotion.temporary_id.clone(),
                record_id: promotion.record_id.clone(),
                user_id: report.user_id.as_ref().map(|u| u.to_string()),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
