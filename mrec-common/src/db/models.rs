//! Typed views over stored rows

use serde::{Deserialize, Serialize};

use crate::store::Record;
use crate::{Error, Result};

/// A note row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub meeting_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Note {
    /// Decode a note from a generic store record
    pub fn from_record(record: Record) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(record))
            .map_err(|e| Error::Internal(format!("malformed note row: {}", e)))
    }
}
