//! Temporary and persisted record identifiers

use std::fmt;

/// Prefix marking a client-generated placeholder id
pub const TEMP_PREFIX: &str = "temp-";

/// Identifier of the record a binding writes to
///
/// A binding starts from either variant and moves from `Temporary` to
/// `Persisted` at most once, on its first successful create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// Client placeholder, used before the record exists in the store
    Temporary(String),
    /// Id assigned by the store
    Persisted(String),
}

impl RecordId {
    /// Fresh temporary id (`temp-<uuid>`)
    pub fn temporary() -> Self {
        RecordId::Temporary(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Classify an id string by its prefix
    ///
    /// # Examples
    ///
    /// ```
    /// use mrec_autosave::RecordId;
    ///
    /// assert!(RecordId::parse("temp-1").is_temporary());
    /// assert_eq!(RecordId::parse("abc123"), RecordId::Persisted("abc123".to_string()));
    /// ```
    pub fn parse(id: &str) -> Self {
        if id.starts_with(TEMP_PREFIX) {
            RecordId::Temporary(id.to_string())
        } else {
            RecordId::Persisted(id.to_string())
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, RecordId::Temporary(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecordId::Temporary(id) | RecordId::Persisted(id) => id,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
