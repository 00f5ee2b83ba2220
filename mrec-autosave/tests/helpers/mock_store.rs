//! Scripted in-memory record store
//!
//! Every call is recorded. Each call pops the next `(delay, fail)` entry from
//! the script; once the script runs out, calls succeed after
//! `DEFAULT_DELAY`. Creates hand out ids from `ids` in order.

use async_trait::async_trait;
use mrec_common::store::{Record, RecordFilter, RecordStore};
use mrec_common::{Error, Result, UserId};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        table: String,
        payload: Record,
    },
    Update {
        table: String,
        column: String,
        value: Value,
        filter: RecordFilter,
    },
}

pub struct MockStore {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<(Duration, bool)>>,
    ids: Mutex<VecDeque<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            ids: Mutex::new(VecDeque::from(vec!["abc123".to_string()])),
        }
    }

    /// Queue the behavior of the next call
    pub fn then(&self, delay: Duration, fail: bool) -> &Self {
        self.script.lock().unwrap().push_back((delay, fail));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> Vec<Record> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create { payload, .. } => Some(payload),
                Call::Update { .. } => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, Value, RecordFilter)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update {
                    column,
                    value,
                    filter,
                    ..
                } => Some((column, value, filter)),
                Call::Create { .. } => None,
            })
            .collect()
    }

    async fn play(&self) -> bool {
        let (delay, fail) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((DEFAULT_DELAY, false));
        tokio::time::sleep(delay).await;
        fail
    }
}

#[async_trait]
impl RecordStore for MockStore {
    async fn create(&self, table: &str, payload: Record) -> Result<Record> {
        self.calls.lock().unwrap().push(Call::Create {
            table: table.to_string(),
            payload: payload.clone(),
        });
        if self.play().await {
            return Err(Error::Persistence("insert rejected".to_string()));
        }

        let id = self
            .ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut record = payload;
        record.insert("id".to_string(), Value::String(id));
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        column: &str,
        value: Value,
        filter: &RecordFilter,
    ) -> Result<Record> {
        self.calls.lock().unwrap().push(Call::Update {
            table: table.to_string(),
            column: column.to_string(),
            value: value.clone(),
            filter: filter.clone(),
        });
        if self.play().await {
            return Err(Error::Persistence("update rejected".to_string()));
        }

        let mut record = Record::new();
        record.insert("id".to_string(), Value::String(filter.id.clone()));
        record.insert(column.to_string(), value);
        Ok(record)
    }

    async fn delete(&self, table: &str, filter: &RecordFilter) -> Result<()> {
        Err(Error::NotFound(format!("{}/{}", table, filter.id)))
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Record> {
        Err(Error::NotFound(format!("{}/{}", table, filter.id)))
    }

    async fn list(&self, _: &str, _: &UserId, _: i64, _: i64) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn count(&self, _: &str, _: &UserId) -> Result<i64> {
        Ok(0)
    }
}
