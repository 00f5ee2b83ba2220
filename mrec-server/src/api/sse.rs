//! Server-Sent Events for record invalidations

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Extension,
};
use futures::stream::Stream;
use mrec_common::UserId;
use std::convert::Infallible;

/// GET /api/events
///
/// Streams `Invalidated`, `RecordPromoted` and `RecordDeleted` events for
/// the authenticated user's records.
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    mrec_common::sse::record_event_stream("mrec-server", &state.events, user)
}
