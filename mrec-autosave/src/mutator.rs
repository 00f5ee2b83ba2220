//! Create-or-update of one bound column
//!
//! A mutator owns the record identity of its binding. While the identity is
//! temporary, a commit creates the record (with parent defaults and the
//! acting user) and promotes the identity to the store-assigned id. Every
//! later commit updates the single bound column, filtered by record id and
//! acting user.
//!
//! The identity sits behind an async mutex that is held for the whole
//! create, so a second commit issued mid-create waits for the real id and
//! then updates instead of creating a duplicate row.

use mrec_common::events::CacheKey;
use mrec_common::store::{Record, RecordFilter, RecordStore};
use mrec_common::{AuthProvider, Error, Result, UserId};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::record_id::RecordId;

/// Converts a field value into its stored representation
pub type ValueTransform<V> = Arc<dyn Fn(&V) -> Value + Send + Sync>;

/// Column values merged into the payload of the first create only
#[derive(Clone, Default)]
pub enum ParentDefaults {
    #[default]
    None,
    Static(Record),
    /// Computed from the acting user at create time
    PerUser(Arc<dyn Fn(&UserId) -> Record + Send + Sync>),
}

impl ParentDefaults {
    fn resolve(&self, user: &UserId) -> Record {
        match self {
            ParentDefaults::None => Record::new(),
            ParentDefaults::Static(defaults) => defaults.clone(),
            ParentDefaults::PerUser(compute) => compute(user),
        }
    }
}

impl fmt::Debug for ParentDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentDefaults::None => f.write_str("None"),
            ParentDefaults::Static(defaults) => f.debug_tuple("Static").field(defaults).finish(),
            ParentDefaults::PerUser(_) => f.write_str("PerUser(..)"),
        }
    }
}

/// Stores an empty string as SQL NULL
///
/// ```
/// use mrec_autosave::empty_string_to_null;
///
/// let transform = empty_string_to_null();
/// assert!(transform(&String::new()).is_null());
/// assert_eq!(transform(&"x".to_string()), "x");
/// ```
pub fn empty_string_to_null() -> ValueTransform<String> {
    Arc::new(|value: &String| {
        if value.is_empty() {
            Value::Null
        } else {
            Value::String(value.clone())
        }
    })
}

fn serialize_value<V: Serialize>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(error = %e, "Field value did not serialize; storing null");
        Value::Null
    })
}

/// One-time promotion of a temporary id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub temporary_id: String,
    pub record_id: String,
}

/// Outcome of one commit
#[derive(Debug)]
pub struct MutationReport {
    pub result: Result<Record>,
    /// Set only by the create that promoted the identity
    pub created: Option<Promotion>,
    /// Cached reads made stale by this commit, whatever its outcome
    pub invalidations: Vec<CacheKey>,
    /// Acting user, when one was signed in
    pub user_id: Option<UserId>,
}

impl MutationReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct PersistenceMutator<V> {
    store: Arc<dyn RecordStore>,
    auth: Arc<dyn AuthProvider>,
    table: String,
    column: String,
    identity: Mutex<RecordId>,
    parent_defaults: ParentDefaults,
    transform: ValueTransform<V>,
}

impl<V> PersistenceMutator<V>
where
    V: Serialize + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        table: impl Into<String>,
        column: impl Into<String>,
        record_id: RecordId,
    ) -> Self {
        Self {
            store,
            auth,
            table: table.into(),
            column: column.into(),
            identity: Mutex::new(record_id),
            parent_defaults: ParentDefaults::None,
            transform: Arc::new(serialize_value::<V>),
        }
    }

    pub fn with_parent_defaults(mut self, defaults: ParentDefaults) -> Self {
        self.parent_defaults = defaults;
        self
    }

    pub fn with_transform(mut self, transform: ValueTransform<V>) -> Self {
        self.transform = transform;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Current identity; waits for an in-flight create to settle
    pub async fn record_id(&self) -> RecordId {
        self.identity.lock().await.clone()
    }

    /// Persist `value` into the bound column
    pub async fn commit(&self, value: &V) -> MutationReport {
        let Some(user) = self.auth.current_user().await else {
            return MutationReport {
                result: Err(Error::Unauthorized(format!(
                    "saving {}.{} requires a signed-in user",
                    self.table, self.column
                ))),
                created: None,
                invalidations: Vec::new(),
                user_id: None,
            };
        };

        let stored = (self.transform)(value);
        let mut identity = self.identity.lock().await;

        let current = identity.clone();
        match current {
            RecordId::Temporary(temporary_id) => {
                let mut report = self.create(&user, &temporary_id, stored).await;
                if let Some(promotion) = &report.created {
                    *identity = RecordId::Persisted(promotion.record_id.clone());
                }
                report.user_id = Some(user);
                report
            }
            RecordId::Persisted(record_id) => {
                drop(identity);
                self.update(user, record_id, stored).await
            }
        }
    }

    async fn create(&self, user: &UserId, temporary_id: &str, stored: Value) -> MutationReport {
        let mut payload = self.parent_defaults.resolve(user);
        payload.insert(self.column.clone(), stored);
        payload
            .entry(mrec_common::db::USER_COLUMN.to_string())
            .or_insert_with(|| Value::String(user.to_string()));

        let mut invalidations = vec![CacheKey::new(&self.table, temporary_id)];

        let result = self.store.create(&self.table, payload).await.and_then(|record| {
            let id = record
                .get(mrec_common::db::ID_COLUMN)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            match id {
                Some(id) => Ok((id, record)),
                None => Err(Error::Persistence(format!(
                    "create on {} returned no record id",
                    self.table
                ))),
            }
        });

        match result {
            Ok((record_id, record)) => {
                info!(
                    table = %self.table,
                    temporary_id,
                    record_id = %record_id,
                    "Promoted temporary record"
                );
                invalidations.push(CacheKey::new(&self.table, &record_id));
                MutationReport {
                    result: Ok(record),
                    created: Some(Promotion {
                        temporary_id: temporary_id.to_string(),
                        record_id,
                    }),
                    invalidations,
                    user_id: None,
                }
            }
            Err(e) => {
                warn!(table = %self.table, temporary_id, error = %e, "Create failed");
                MutationReport {
                    result: Err(e),
                    created: None,
                    invalidations,
                    user_id: None,
                }
            }
        }
    }

    async fn update(&self, user: UserId, record_id: String, stored: Value) -> MutationReport {
        let filter = RecordFilter::new(&record_id, user.clone());
        let result = self
            .store
            .update(&self.table, &self.column, stored, &filter)
            .await;

        match &result {
            Ok(_) => debug!(
                table = %self.table,
                column = %self.column,
                record_id = %record_id,
                "Updated column"
            ),
            Err(e) => warn!(
                table = %self.table,
                column = %self.column,
                record_id = %record_id,
                error = %e,
                "Update failed"
            ),
        }

        MutationReport {
            result,
            created: None,
            invalidations: vec![CacheKey::new(&self.table, record_id)],
            user_id: Some(user),
        }
    }
}
