//! Field binding behavior against a scripted store
//!
//! All tests run on a paused clock, so debounce windows and store delays
//! elapse deterministically.

mod helpers;

use helpers::{MockStore, RecordingObserver};
use mrec_autosave::{
    empty_string_to_null, CommitMode, FieldBinding, ParentDefaults, RecordId, SaveStatus,
};
use mrec_common::events::{EventBus, RecordEvent};
use mrec_common::{Error, StaticUser, UserId};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const DEBOUNCE: Duration = Duration::from_millis(2000);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn title_binding(
    store: &Arc<MockStore>,
    observer: &Arc<RecordingObserver>,
    id: RecordId,
    initial: &str,
    mode: CommitMode,
) -> FieldBinding<String> {
    FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "notes",
        "title",
        id,
        initial.to_string(),
    )
    .mode(mode)
    .observer(observer.clone())
    .build()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_create_then_update_promotes_once() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Temporary("temp-1".to_string()),
        "",
        CommitMode::Debounced(DEBOUNCE),
    );

    binding.handle_change("Meeting Recap".to_string());
    assert_eq!(binding.value(), "Meeting Recap");
    sleep(ms(2100)).await;

    let creates = store.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(
        Value::Object(creates[0].clone()),
        json!({"title": "Meeting Recap", "user_id": "u1"})
    );
    assert_eq!(observer.created(), vec!["abc123".to_string()]);
    assert_eq!(
        binding.record_id().await,
        RecordId::Persisted("abc123".to_string())
    );

    binding.handle_change("Meeting Recap Final".to_string());
    sleep(ms(2100)).await;

    assert_eq!(store.creates().len(), 1);
    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "title");
    assert_eq!(updates[0].1, json!("Meeting Recap Final"));
    assert_eq!(updates[0].2.id, "abc123");
    assert_eq!(updates[0].2.user_id, UserId::new("u1"));

    assert_eq!(binding.saved_value(), "Meeting Recap Final");
    assert_eq!(observer.created().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_update_rolls_back_and_holds_error() {
    let store = Arc::new(MockStore::new());
    store.then(ms(50), true);
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "Draft",
        CommitMode::Debounced(DEBOUNCE),
    );

    binding.handle_change("Draft v2".to_string());
    assert_eq!(binding.value(), "Draft v2");
    assert!(binding.has_unsaved_changes());

    sleep(ms(2100)).await;

    assert_eq!(binding.value(), "Draft");
    assert_eq!(binding.saved_value(), "Draft");
    assert!(!binding.has_unsaved_changes());
    assert_eq!(binding.status(), SaveStatus::Error);
    assert_eq!(observer.errors().len(), 1);
    assert!(observer.successes().is_empty());

    sleep(ms(10_000)).await;
    assert_eq!(binding.status(), SaveStatus::Error);

    binding.handle_change("Draft v3".to_string());
    assert_ne!(binding.status(), SaveStatus::Error);
}

// ============================================================================
// Debounce and status lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_commit() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Debounced(DEBOUNCE),
    );

    let mut typed = String::new();
    for c in "Standup".chars() {
        typed.push(c);
        binding.handle_change(typed.clone());
        sleep(ms(150)).await;
    }
    assert!(store.calls().is_empty());

    sleep(ms(2100)).await;

    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1, json!("Standup"));
    assert_eq!(observer.successes(), vec!["Standup".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_status_moves_through_saving_saved_idle() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Debounced(DEBOUNCE),
    );
    assert_eq!(binding.status(), SaveStatus::Idle);

    binding.handle_change("x".to_string());
    assert_eq!(binding.status(), SaveStatus::Saving);

    // Commit dispatched at 2000 ms, answered at 2050 ms
    sleep(ms(2020)).await;
    assert!(binding.is_updating());
    assert_eq!(binding.status(), SaveStatus::Saving);

    sleep(ms(80)).await;
    assert!(!binding.is_updating());
    assert_eq!(binding.status(), SaveStatus::Saved);

    sleep(ms(2000)).await;
    assert_eq!(binding.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_saved_status_cleared_by_newer_edit() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Immediate,
    );

    binding.handle_change("a".to_string());
    sleep(ms(100)).await;
    assert_eq!(binding.status(), SaveStatus::Saved);

    binding.handle_change("ab".to_string());
    sleep(ms(10)).await;
    assert_eq!(binding.status(), SaveStatus::Saving);
}

#[tokio::test(start_paused = true)]
async fn test_blur_flushes_pending_commit() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Debounced(DEBOUNCE),
    );

    binding.handle_blur();
    sleep(ms(10)).await;
    assert!(store.calls().is_empty());

    binding.handle_change("Agenda".to_string());
    sleep(ms(100)).await;
    binding.handle_blur();
    sleep(ms(100)).await;
    assert_eq!(store.updates().len(), 1);

    sleep(ms(5000)).await;
    assert_eq!(store.updates().len(), 1);
    assert_eq!(binding.saved_value(), "Agenda");
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_edits_during_inflight_create_issue_single_create() {
    let store = Arc::new(MockStore::new());
    store.then(ms(500), false);
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Temporary("temp-1".to_string()),
        "",
        CommitMode::Immediate,
    );

    binding.handle_change("a".to_string());
    sleep(ms(10)).await;
    binding.handle_change("b".to_string());
    sleep(ms(10)).await;
    binding.handle_change("c".to_string());
    sleep(ms(2000)).await;

    assert_eq!(store.creates().len(), 1);
    let updates = store.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(_, _, filter)| filter.id == "abc123"));
    assert_eq!(updates[1].1, json!("c"));

    assert_eq!(binding.saved_value(), "c");
    assert_eq!(observer.created(), vec!["abc123".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_failure_does_not_clobber_newer_success() {
    let store = Arc::new(MockStore::new());
    store.then(ms(500), true).then(ms(50), false);
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "Draft",
        CommitMode::Immediate,
    );

    binding.handle_change("x".to_string());
    sleep(ms(10)).await;
    binding.handle_change("y".to_string());
    sleep(ms(1000)).await;

    assert_eq!(store.updates().len(), 2);
    assert_eq!(binding.value(), "y");
    assert_eq!(binding.saved_value(), "y");
    assert_eq!(binding.status(), SaveStatus::Saved);
    assert!(observer.errors().is_empty());
    assert_eq!(observer.successes(), vec!["y".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_discarded_success_rolls_back_past_stored_value() {
    let store = Arc::new(MockStore::new());
    store.then(ms(500), false).then(ms(50), true);
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "notes",
        "title",
        RecordId::Persisted("r1".to_string()),
        "Draft".to_string(),
    )
    .mode(CommitMode::Immediate)
    .events(bus)
    .build();

    binding.handle_change("x".to_string());
    sleep(ms(10)).await;
    binding.handle_change("y".to_string());
    sleep(ms(1000)).await;

    // "x" reached the store but its success was stale, so the rollback
    // lands on the last confirmed value
    let updates = store.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].1, json!("x"));
    assert_eq!(binding.value(), "Draft");
    assert_eq!(binding.saved_value(), "Draft");
    assert_eq!(binding.status(), SaveStatus::Error);

    let mut invalidated = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let RecordEvent::Invalidated { record_id, .. } = event {
            invalidated.push(record_id);
        }
    }
    assert!(invalidated.iter().any(|id| id == "r1"));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_commit() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Debounced(DEBOUNCE),
    );

    binding.handle_change("never saved".to_string());
    drop(binding);
    sleep(ms(10_000)).await;

    assert!(store.calls().is_empty());
    assert!(observer.successes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_response_after_teardown_is_ignored() {
    let store = Arc::new(MockStore::new());
    store.then(ms(500), false);
    let observer = Arc::new(RecordingObserver::default());
    let binding = title_binding(
        &store,
        &observer,
        RecordId::Persisted("r1".to_string()),
        "",
        CommitMode::Immediate,
    );

    binding.handle_change("in flight".to_string());
    sleep(ms(10)).await;
    binding.teardown();
    sleep(ms(1000)).await;

    assert_eq!(store.updates().len(), 1);
    assert!(observer.successes().is_empty());
    assert_eq!(binding.saved_value(), "");

    binding.handle_change("ignored".to_string());
    sleep(ms(1000)).await;
    assert_eq!(store.updates().len(), 1);
}

// ============================================================================
// Mutator options
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_missing_user_fails_without_store_call() {
    let store = Arc::new(MockStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::anonymous()),
        "notes",
        "title",
        RecordId::Persisted("r1".to_string()),
        "Draft".to_string(),
    )
    .mode(CommitMode::Immediate)
    .observer(observer.clone())
    .build();

    binding.handle_change("Draft v2".to_string());
    sleep(ms(100)).await;

    assert!(store.calls().is_empty());
    assert_eq!(binding.value(), "Draft");
    assert_eq!(binding.status(), SaveStatus::Error);
    assert_eq!(observer.errors().len(), 1);
    assert!(observer.errors()[0].starts_with("Unauthorized"));
}

#[tokio::test(start_paused = true)]
async fn test_parent_defaults_only_on_first_create() {
    let store = Arc::new(MockStore::new());
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "notes",
        "content",
        RecordId::temporary(),
        String::new(),
    )
    .mode(CommitMode::Immediate)
    .parent_defaults(ParentDefaults::PerUser(Arc::new(|user: &UserId| {
        let mut defaults = serde_json::Map::new();
        defaults.insert("meeting_id".to_string(), json!("m-42"));
        defaults.insert("title".to_string(), json!(format!("Notes for {}", user)));
        defaults
    })))
    .build();

    binding.handle_change("first".to_string());
    sleep(ms(100)).await;
    binding.handle_change("second".to_string());
    sleep(ms(100)).await;

    let creates = store.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0]["meeting_id"], "m-42");
    assert_eq!(creates[0]["title"], "Notes for u1");
    assert_eq!(creates[0]["content"], "first");

    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "content");
}

#[tokio::test(start_paused = true)]
async fn test_transform_stores_empty_text_as_null() {
    let store = Arc::new(MockStore::new());
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "contacts",
        "phone",
        RecordId::Persisted("c1".to_string()),
        "555-0100".to_string(),
    )
    .mode(CommitMode::Immediate)
    .transform(empty_string_to_null())
    .build();

    binding.handle_change(String::new());
    sleep(ms(100)).await;

    assert_eq!(store.updates()[0].1, Value::Null);
    assert_eq!(binding.saved_value(), "");
}

#[tokio::test(start_paused = true)]
async fn test_non_text_values_commit_immediately() {
    let store = Arc::new(MockStore::new());
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "meetings",
        "duration_seconds",
        RecordId::Persisted("m1".to_string()),
        Some(1800_i64),
    )
    .mode(CommitMode::Immediate)
    .build();

    binding.handle_change(Some(2700));
    sleep(ms(100)).await;
    binding.handle_change(None);
    sleep(ms(100)).await;

    let values: Vec<Value> = store.updates().into_iter().map(|(_, v, _)| v).collect();
    assert_eq!(values, vec![json!(2700), Value::Null]);
    assert_eq!(binding.saved_value(), None);
}

// ============================================================================
// Event bus
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_promotion_publishes_invalidations_and_event() {
    let store = Arc::new(MockStore::new());
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "notes",
        "title",
        RecordId::Temporary("temp-7".to_string()),
        String::new(),
    )
    .mode(CommitMode::Immediate)
    .events(bus.clone())
    .build();

    binding.handle_change("Kickoff".to_string());
    sleep(ms(100)).await;

    let mut invalidated = Vec::new();
    let mut promoted = None;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.user_id(), Some("u1"));
        match event {
            RecordEvent::Invalidated { record_id, .. } => invalidated.push(record_id),
            RecordEvent::RecordPromoted {
                temporary_id,
                record_id,
                ..
            } => promoted = Some((temporary_id, record_id)),
            RecordEvent::RecordDeleted { .. } => panic!("unexpected delete"),
        }
    }

    assert_eq!(invalidated, vec!["temp-7".to_string(), "abc123".to_string()]);
    assert_eq!(promoted, Some(("temp-7".to_string(), "abc123".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_failed_commit_still_invalidates() {
    let store = Arc::new(MockStore::new());
    store.then(ms(50), true);
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let binding = FieldBinding::builder(
        store.clone(),
        Arc::new(StaticUser::signed_in("u1")),
        "notes",
        "title",
        RecordId::Persisted("r1".to_string()),
        String::new(),
    )
    .mode(CommitMode::Immediate)
    .events(bus)
    .build();

    binding.handle_change("x".to_string());
    sleep(ms(100)).await;

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type(), "Invalidated");
    assert!(matches!(
        event,
        RecordEvent::Invalidated { ref record_id, .. } if record_id == "r1"
    ));
    assert_eq!(binding.status(), SaveStatus::Error);
}

#[test]
fn test_error_text_is_not_leaked_into_status() {
    let err = Error::Persistence("constraint".to_string());
    assert_eq!(err.user_message(), "Your changes could not be saved.");
}
