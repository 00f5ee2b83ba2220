//! Record events and the EventBus
//!
//! Mutations never touch a hidden shared cache. Instead every mutation
//! reports the cache keys it affected, and the caller publishes them here so
//! any observer of the same record (another binding, an SSE client) can
//! refresh.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::auth::UserId;

/// Identifies one cached read of a record: `(table, record_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub table: String,
    pub record_id: String,
}

impl CacheKey {
    pub fn new(table: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            record_id: record_id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.record_id)
    }
}

/// Record event types
///
/// Events are broadcast via EventBus and serialized as-is for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecordEvent {
    /// A cached read of this record is stale and should be refetched
    ///
    /// Emitted after every create/update/delete settles, whether or not the
    /// operation succeeded.
    Invalidated {
        table: String,
        record_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A record that only existed under a client placeholder id was created
    RecordPromoted {
        table: String,
        temporary_id: String,
        record_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A record was deleted
    RecordDeleted {
        table: String,
        record_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RecordEvent {
    /// Build an invalidation event for a cache key
    pub fn invalidated(key: &CacheKey, user_id: Option<&UserId>) -> Self {
        RecordEvent::Invalidated {
            table: key.table.clone(),
            record_id: key.record_id.clone(),
            user_id: user_id.map(|u| u.to_string()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            RecordEvent::Invalidated { .. } => "Invalidated",
            RecordEvent::RecordPromoted { .. } => "RecordPromoted",
            RecordEvent::RecordDeleted { .. } => "RecordDeleted",
        }
    }

    /// Owner of the record, when known
    ///
    /// Server-side subscribers only forward events whose owner matches the
    /// connected user.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            RecordEvent::Invalidated { user_id, .. }
            | RecordEvent::RecordPromoted { user_id, .. }
            | RecordEvent::RecordDeleted { user_id, .. } => user_id.as_deref(),
        }
    }

    /// Table the event refers to
    pub fn table(&self) -> &str {
        match self {
            RecordEvent::Invalidated { table, .. }
            | RecordEvent::RecordPromoted { table, .. }
            | RecordEvent::RecordDeleted { table, .. } => table,
        }
    }
}

/// Broadcast channel for record events
///
/// Cloning an EventBus yields another handle to the same channel.
///
/// # Examples
///
/// ```
/// use mrec_common::events::{CacheKey, EventBus, RecordEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(RecordEvent::invalidated(&CacheKey::new("notes", "abc123"), None));
/// assert_eq!(rx.try_recv().unwrap().table(), "notes");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecordEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RecordEvent,
    ) -> Result<usize, broadcast::error::SendError<RecordEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RecordEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish one invalidation per key
    pub fn invalidate_all(&self, keys: &[CacheKey], user_id: Option<&UserId>) {
        for key in keys {
            tracing::debug!(key = %key, "Invalidating cached record");
            self.emit_lossy(RecordEvent::invalidated(key, user_id));
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(4);
        let result = bus.emit(RecordEvent::invalidated(&CacheKey::new("notes", "x"), None));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_all_reaches_every_subscriber() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let owner = UserId::new("u1");
        bus.invalidate_all(
            &[CacheKey::new("notes", "1"), CacheKey::new("contacts", "2")],
            Some(&owner),
        );

        for rx in [&mut a, &mut b] {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            assert_eq!(first.table(), "notes");
            assert_eq!(second.table(), "contacts");
            assert_eq!(first.event_type(), "Invalidated");
            assert_eq!(first.user_id(), Some("u1"));
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RecordEvent::RecordPromoted {
            table: "notes".to_string(),
            temporary_id: "temp-1".to_string(),
            record_id: "abc123".to_string(),
            user_id: None,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RecordPromoted");
        assert_eq!(json["record_id"], "abc123");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_cache_key_display() {
        assert_eq!(CacheKey::new("notes", "abc").to_string(), "notes/abc");
    }
}
