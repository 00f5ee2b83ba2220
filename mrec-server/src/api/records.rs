//! Record actions
//!
//! CRUD over the user-owned tables. Every call is scoped to the
//! authenticated user: creates are stamped with their id and every
//! read, update and delete is filtered by it. Each settled mutation is
//! published on the event bus so SSE clients can refresh.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mrec_common::db::USER_COLUMN;
use mrec_common::events::{CacheKey, RecordEvent};
use mrec_common::store::{Record, RecordFilter, RecordStore};
use mrec_common::{Error, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Body of a single-column update
#[derive(Debug, Deserialize)]
pub struct ColumnUpdate {
    pub column: String,
    #[serde(default)]
    pub value: Value,
}

/// GET /api/records/:table
pub async fn list_records(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIMIT);
    let offset = query.offset.max(0);

    let total = state.store.count(&table, &user).await?;
    let records = state.store.list(&table, &user, limit, offset).await?;

    Ok(Json(RecordPage {
        records,
        total,
        limit,
        offset,
    }))
}

/// POST /api/records/:table
pub async fn create_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path(table): Path<String>,
    Json(mut payload): Json<Record>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    match payload.get(USER_COLUMN) {
        None | Some(Value::Null) => {}
        Some(Value::String(owner)) if owner == user.as_str() => {}
        Some(_) => {
            return Err(Error::Validation(format!(
                "{} must be the signed-in user",
                USER_COLUMN
            ))
            .into())
        }
    }
    payload.insert(USER_COLUMN.to_string(), Value::String(user.to_string()));

    let record = state.store.create(&table, payload).await?;
    if let Some(id) = record.get("id").and_then(Value::as_str) {
        state
            .events
            .invalidate_all(&[CacheKey::new(&table, id)], Some(&user));
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/records/:table/:id
pub async fn get_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Record>, ApiError> {
    let record = state
        .store
        .get(&table, &RecordFilter::new(id, user))
        .await?;
    Ok(Json(record))
}

/// PATCH /api/records/:table/:id
pub async fn update_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path((table, id)): Path<(String, String)>,
    Json(update): Json<ColumnUpdate>,
) -> Result<Json<Record>, ApiError> {
    let filter = RecordFilter::new(&id, user.clone());
    let result = state
        .store
        .update(&table, &update.column, update.value, &filter)
        .await;

    // Settled either way: observers refetch
    state
        .events
        .invalidate_all(&[CacheKey::new(&table, &id)], Some(&user));

    Ok(Json(result?))
}

/// DELETE /api/records/:table/:id
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete(&table, &RecordFilter::new(&id, user.clone()))
        .await?;

    state.events.emit_lossy(RecordEvent::RecordDeleted {
        table,
        record_id: id,
        user_id: Some(user.to_string()),
        timestamp: mrec_common::time::now(),
    });

    Ok(StatusCode::NO_CONTENT)
}
