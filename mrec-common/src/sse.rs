//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::auth::UserId;
use crate::events::EventBus;

/// Stream record events owned by `user_id` to one SSE client
///
/// Sends a `ConnectionStatus` event first, then one event per record event
/// whose owner matches. A lagging client gets a `Resync` event telling it to
/// refetch everything it has cached.
pub fn record_event_stream(
    service_name: &'static str,
    event_bus: &EventBus,
    user_id: UserId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %user_id, "New SSE client connected to {} record events", service_name);

    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.user_id() != Some(user_id.as_str()) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: forwarding {} for {}", event.event_type(), event.table());
                            yield Ok(Event::default().event(event.event_type()).data(json));
                        }
                        Err(e) => warn!("SSE: failed to serialize event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: client lagged, {} events skipped", skipped);
                    yield Ok(Event::default().event("Resync").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
