//! Note tools the chat assistant can call
//!
//! Each tool takes the model's JSON arguments, normalizes them (trimmed
//! strings, de-duplicated id lists), validates them before touching the
//! store, and answers with `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`. Tool failures go back to the model
//! as data; they never fail the chat request.

use mrec_common::db::{Note, NOTES};
use mrec_common::events::{CacheKey, EventBus, RecordEvent};
use mrec_common::store::{Record, RecordFilter, RecordStore};
use mrec_common::{Error, Result, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info};

pub const CREATE_NOTE: &str = "create_note";
pub const UPDATE_NOTE: &str = "update_note";
pub const DELETE_NOTES: &str = "delete_notes";
pub const GET_NOTES: &str = "get_notes";

const DEFAULT_NOTE_TITLE: &str = "Untitled note";
const DEFAULT_GET_LIMIT: i64 = 20;
const MAX_GET_LIMIT: i64 = 100;

/// Outcome of one tool call, as sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"success":false,"error":"unserializable result"}"#.to_string())
    }
}

impl From<Result<Value>> for ToolResult {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(data) => ToolResult::ok(data),
            Err(Error::Validation(message)) => ToolResult::err(message),
            Err(e) => ToolResult::err(e.user_message()),
        }
    }
}

/// Function-tool schemas advertised to the model
pub fn definitions() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": CREATE_NOTE,
                "description": "Create a note for the current user.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "content": {"type": "string"},
                        "meeting_id": {
                            "type": "string",
                            "description": "Meeting the note belongs to"
                        }
                    },
                    "required": ["content"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": UPDATE_NOTE,
                "description": "Change the title and/or content of one note.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "title": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["id"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": DELETE_NOTES,
                "description": "Delete notes by id.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "ids": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["ids"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": GET_NOTES,
                "description":
                    "Fetch notes by id, or the most recently edited notes when no ids are given.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "ids": {"type": "array", "items": {"type": "string"}},
                        "limit": {"type": "integer", "minimum": 1, "maximum": MAX_GET_LIMIT}
                    }
                }
            }
        }),
    ]
}

#[derive(Debug, Deserialize)]
struct CreateNoteArgs {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    meeting_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateNoteArgs {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteIdsArgs {
    #[serde(default)]
    ids: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<i64>,
}

/// Trimmed string, or `None` when nothing is left
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop blanks and de-duplicate, keeping first-seen order
pub fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: &str) -> Result<T> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments)
        .map_err(|e| Error::Validation(format!("invalid tool arguments: {}", e)))
}

fn note_json(record: Record) -> Result<Value> {
    let note = Note::from_record(record)?;
    serde_json::to_value(note).map_err(|e| Error::Internal(e.to_string()))
}

/// Note tools bound to one acting user
pub struct NoteTools<'a> {
    store: &'a dyn RecordStore,
    events: &'a EventBus,
    user: &'a UserId,
}

impl<'a> NoteTools<'a> {
    pub fn new(store: &'a dyn RecordStore, events: &'a EventBus, user: &'a UserId) -> Self {
        Self {
            store,
            events,
            user,
        }
    }

    /// Run the named tool with the model's raw JSON arguments
    pub async fn execute(&self, name: &str, arguments: &str) -> ToolResult {
        debug!(tool = name, user_id = %self.user, "Executing tool");

        let result = match name {
            CREATE_NOTE => self.create_note(arguments).await,
            UPDATE_NOTE => self.update_note(arguments).await,
            DELETE_NOTES => self.delete_notes(arguments).await,
            GET_NOTES => self.get_notes(arguments).await,
            other => Err(Error::Validation(format!("unknown tool '{}'", other))),
        };

        ToolResult::from(result)
    }

    fn invalidate(&self, id: &str) {
        self.events
            .invalidate_all(&[CacheKey::new(NOTES.name, id)], Some(self.user));
    }

    async fn create_note(&self, arguments: &str) -> Result<Value> {
        let args: CreateNoteArgs = parse_args(arguments)?;
        let content = clean(args.content)
            .ok_or_else(|| Error::Validation("note content is required".to_string()))?;
        let title = clean(args.title).unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string());

        let mut payload = Record::new();
        payload.insert("title".to_string(), Value::String(title));
        payload.insert("content".to_string(), Value::String(content));
        if let Some(meeting_id) = clean(args.meeting_id) {
            payload.insert("meeting_id".to_string(), Value::String(meeting_id));
        }
        payload.insert("user_id".to_string(), Value::String(self.user.to_string()));

        let record = self.store.create(NOTES.name, payload).await?;
        let note = note_json(record)?;
        if let Some(id) = note["id"].as_str() {
            info!(note_id = id, "Assistant created note");
            self.invalidate(id);
        }
        Ok(note)
    }

    async fn update_note(&self, arguments: &str) -> Result<Value> {
        let args: UpdateNoteArgs = parse_args(arguments)?;
        let id = clean(args.id)
            .ok_or_else(|| Error::Validation("note id is required".to_string()))?;

        let title = args.title.map(|t| t.trim().to_string());
        let content = match args.content {
            Some(c) => Some(
                clean(Some(c))
                    .ok_or_else(|| Error::Validation("note content cannot be empty".to_string()))?,
            ),
            None => None,
        };
        if title.is_none() && content.is_none() {
            return Err(Error::Validation(
                "nothing to update: provide a title or content".to_string(),
            ));
        }

        let filter = RecordFilter::new(&id, self.user.clone());
        let mut record = None;
        for (column, value) in [("title", title), ("content", content)] {
            if let Some(value) = value {
                let updated = self
                    .store
                    .update(NOTES.name, column, Value::String(value), &filter)
                    .await;
                self.invalidate(&id);
                record = Some(updated?);
            }
        }

        match record {
            Some(record) => note_json(record),
            None => Err(Error::Internal("update produced no record".to_string())),
        }
    }

    async fn delete_notes(&self, arguments: &str) -> Result<Value> {
        let args: NoteIdsArgs = parse_args(arguments)?;
        let ids = normalize_ids(args.ids.unwrap_or_default());
        if ids.is_empty() {
            return Err(Error::Validation("at least one note id is required".to_string()));
        }

        let mut deleted = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            let filter = RecordFilter::new(&id, self.user.clone());
            match self.store.delete(NOTES.name, &filter).await {
                Ok(()) => {
                    self.events.emit_lossy(RecordEvent::RecordDeleted {
                        table: NOTES.name.to_string(),
                        record_id: id.clone(),
                        user_id: Some(self.user.to_string()),
                        timestamp: mrec_common::time::now(),
                    });
                    deleted.push(id);
                }
                Err(Error::NotFound(_)) | Err(Error::Forbidden(_)) => missing.push(id),
                Err(e) => return Err(e),
            }
        }

        info!(deleted = deleted.len(), missing = missing.len(), "Assistant deleted notes");
        Ok(json!({ "deleted": deleted, "missing": missing }))
    }

    async fn get_notes(&self, arguments: &str) -> Result<Value> {
        let args: NoteIdsArgs = parse_args(arguments)?;
        let ids = normalize_ids(args.ids.unwrap_or_default());

        let records = if ids.is_empty() {
            let limit = args
                .limit
                .unwrap_or(DEFAULT_GET_LIMIT)
                .clamp(1, MAX_GET_LIMIT);
            self.store.list(NOTES.name, self.user, limit, 0).await?
        } else {
            let mut found = Vec::with_capacity(ids.len());
            for id in &ids {
                let filter = RecordFilter::new(id, self.user.clone());
                match self.store.get(NOTES.name, &filter).await {
                    Ok(record) => found.push(record),
                    Err(Error::NotFound(_)) | Err(Error::Forbidden(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            found
        };

        let notes = records
            .into_iter()
            .map(note_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ "notes": notes, "count": notes.len() }))
    }
}
