//! Record store contract and its SQLite implementation
//!
//! Records are JSON objects keyed by column name. Every update, delete and
//! single-record read is filtered by both the record id and the acting user,
//! so one user can never touch another user's rows.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, ValueRef};
use tracing::{debug, warn};

use crate::auth::UserId;
use crate::db::schema::{table_definition, TableDefinition, ID_COLUMN, USER_COLUMN};
use crate::{Error, Result};

/// One stored row, keyed by column name
pub type Record = Map<String, Value>;

/// Scope of an update, delete or single-record read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub id: String,
    pub user_id: UserId,
}

impl RecordFilter {
    pub fn new(id: impl Into<String>, user_id: UserId) -> Self {
        Self {
            id: id.into(),
            user_id,
        }
    }
}

/// Backing store for user-owned records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record; the store assigns the id and timestamps
    async fn create(&self, table: &str, payload: Record) -> Result<Record>;

    /// Set a single column on the record matched by `filter`
    async fn update(
        &self,
        table: &str,
        column: &str,
        value: Value,
        filter: &RecordFilter,
    ) -> Result<Record>;

    /// Delete the record matched by `filter`
    async fn delete(&self, table: &str, filter: &RecordFilter) -> Result<()>;

    /// Fetch the record matched by `filter`
    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Record>;

    /// List a user's records, most recently updated first
    async fn list(&self, table: &str, user_id: &UserId, limit: i64, offset: i64)
        -> Result<Vec<Record>>;

    /// Count a user's records
    async fn count(&self, table: &str, user_id: &UserId) -> Result<i64>;
}

/// `RecordStore` over the local SQLite database
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn table(name: &str) -> Result<&'static TableDefinition> {
        table_definition(name).ok_or_else(|| Error::NotFound(format!("table '{}'", name)))
    }

    /// Tell "not there" apart from "not yours" after a filtered statement matched nothing
    async fn missing_or_foreign(&self, table: &TableDefinition, filter: &RecordFilter) -> Error {
        let exists: std::result::Result<bool, sqlx::Error> = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)",
            table.name, ID_COLUMN
        ))
        .bind(&filter.id)
        .fetch_one(&self.db)
        .await;

        match exists {
            Ok(true) => {
                warn!(
                    table = table.name,
                    record_id = %filter.id,
                    user_id = %filter.user_id,
                    "Rejected access to record owned by another user"
                );
                Error::Forbidden(format!("{}/{}", table.name, filter.id))
            }
            Ok(false) => Error::NotFound(format!("{}/{}", table.name, filter.id)),
            Err(e) => Error::Database(e),
        }
    }

    async fn fetch_filtered(
        &self,
        table: &TableDefinition,
        filter: &RecordFilter,
    ) -> Result<Option<Record>> {
        let row = sqlx::query(&format!(
            "SELECT * FROM {} WHERE {} = ? AND {} = ?",
            table.name, ID_COLUMN, USER_COLUMN
        ))
        .bind(&filter.id)
        .bind(filter.user_id.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(row.as_ref().map(row_to_record))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, table: &str, payload: Record) -> Result<Record> {
        let def = Self::table(table)?;

        let user_id = match payload.get(USER_COLUMN) {
            Some(Value::String(s)) if !s.is_empty() => UserId::new(s.clone()),
            _ => return Err(Error::Validation(format!("{} is required", USER_COLUMN))),
        };

        for column in payload.keys() {
            if !def.is_writable(column) {
                return Err(Error::Validation(format!(
                    "column '{}' is not writable on {}",
                    column, table
                )));
            }
        }

        let id = crate::uuid_utils::generate_record_id();
        let now = crate::time::now_rfc3339();

        let mut columns = vec![
            ID_COLUMN.to_string(),
            "created_at".to_string(),
            "updated_at".to_string(),
        ];
        let mut values = vec![
            Value::String(id.clone()),
            Value::String(now.clone()),
            Value::String(now),
        ];
        for (column, value) in payload {
            columns.push(column);
            values.push(value);
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            def.name,
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_json(query, value);
        }
        query.execute(&self.db).await?;

        debug!(table = def.name, record_id = %id, "Created record");

        self.fetch_filtered(def, &RecordFilter::new(id.clone(), user_id))
            .await?
            .ok_or_else(|| Error::Internal(format!("{}/{} vanished after insert", def.name, id)))
    }

    async fn update(
        &self,
        table: &str,
        column: &str,
        value: Value,
        filter: &RecordFilter,
    ) -> Result<Record> {
        let def = Self::table(table)?;
        if !def.is_writable(column) || column == USER_COLUMN {
            return Err(Error::Validation(format!(
                "column '{}' is not writable on {}",
                column, table
            )));
        }

        let sql = format!(
            "UPDATE {} SET {} = ?, updated_at = ? WHERE {} = ? AND {} = ?",
            def.name, column, ID_COLUMN, USER_COLUMN
        );
        let result = bind_json(sqlx::query(&sql), value)
            .bind(crate::time::now_rfc3339())
            .bind(&filter.id)
            .bind(filter.user_id.as_str())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_foreign(def, filter).await);
        }

        debug!(table = def.name, record_id = %filter.id, column, "Updated record");

        self.fetch_filtered(def, filter)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{}/{}", def.name, filter.id)))
    }

    async fn delete(&self, table: &str, filter: &RecordFilter) -> Result<()> {
        let def = Self::table(table)?;

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ? AND {} = ?",
            def.name, ID_COLUMN, USER_COLUMN
        ))
        .bind(&filter.id)
        .bind(filter.user_id.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_foreign(def, filter).await);
        }

        debug!(table = def.name, record_id = %filter.id, "Deleted record");
        Ok(())
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Record> {
        let def = Self::table(table)?;
        match self.fetch_filtered(def, filter).await? {
            Some(record) => Ok(record),
            None => Err(self.missing_or_foreign(def, filter).await),
        }
    }

    async fn list(
        &self,
        table: &str,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Record>> {
        let def = Self::table(table)?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY updated_at DESC, {} ASC LIMIT ? OFFSET ?",
            def.name, USER_COLUMN, ID_COLUMN
        ))
        .bind(user_id.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn count(&self, table: &str, user_id: &UserId) -> Result<i64> {
        let def = Self::table(table)?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            def.name, USER_COLUMN
        ))
        .bind(user_id.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(total)
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind a JSON value using the closest SQLite storage class
fn bind_json(query: SqliteQuery<'_>, value: Value) -> SqliteQuery<'_> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s),
        other => query.bind(other.to_string()),
    }
}

/// Convert a SQLite row to a JSON record
fn row_to_record(row: &SqliteRow) -> Record {
    let mut record = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = row
            .try_get_raw(i)
            .ok()
            .and_then(|raw| {
                if raw.is_null() {
                    Some(Value::Null)
                } else {
                    row.try_get::<String, _>(i)
                        .ok()
                        .map(Value::String)
                        .or_else(|| row.try_get::<i64, _>(i).ok().map(Value::from))
                        .or_else(|| row.try_get::<f64, _>(i).ok().map(Value::from))
                }
            })
            .unwrap_or(Value::Null);
        record.insert(column.name().to_string(), value);
    }
    record
}
