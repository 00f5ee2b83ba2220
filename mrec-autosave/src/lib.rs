//! Optimistic, debounced field-level auto-save
//!
//! A [`FieldBinding`] ties one editable field to one `(table, column, record)`
//! triple. Edits apply locally at once; commits are coalesced by a
//! [`CommitScheduler`], executed by a [`PersistenceMutator`] (which promotes a
//! temporary record id to a real one on the first successful create), and
//! reported through a [`StatusReporter`].
//!
//! ```rust,ignore
//! let record = RecordId::temporary();
//! let binding = FieldBinding::builder(store, auth, "notes", "title", record, String::new())
//!     .mode(CommitMode::Debounced(Duration::from_millis(2000)))
//!     .build();
//! binding.handle_change("Meeting Recap".to_string());
//! ```

pub mod binding;
pub mod mutator;
pub mod record_id;
pub mod remote;
pub mod scheduler;
pub mod status;

pub use binding::{BindingBuilder, BindingObserver, CommitMode, FieldBinding, FieldValue};
pub use mutator::{
    empty_string_to_null, MutationReport, ParentDefaults, PersistenceMutator, Promotion,
    ValueTransform,
};
pub use record_id::RecordId;
pub use remote::{HttpRecordStore, RemoteStoreError};
pub use scheduler::CommitScheduler;
pub use status::{SaveStatus, StatusReporter};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
