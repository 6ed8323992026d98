//! Server-Sent Events (SSE) broadcaster
//!
//! Streams karaoke domain events to connected clients. `?event_id=` limits
//! the stream to one karaoke event plus catalog notifications.

use crate::state::AppState;
use super::extract::Query;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use kq_common::events::KaraokeEvent;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub event_id: Option<Uuid>,
}

/// Whether a subscriber filtered to `wanted` should see `event`
fn wants(wanted: Option<Uuid>, event: &KaraokeEvent) -> bool {
    match (wanted, event.event_id()) {
        (None, _) | (_, None) => true,
        (Some(wanted), Some(id)) => wanted == id,
    }
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();
    debug!(
        "New SSE client connected (filter: {:?}, {} subscribers)",
        params.event_id,
        state.bus.subscriber_count()
    );
    let wanted = params.event_id;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if !wants(wanted, &event) => None,
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    let event_type = event.event_type();
                    debug!("Broadcasting SSE event: {}", event_type);
                    Some(Ok(Event::default().event(event_type).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged: the client refetches on the next event
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.sse_keepalive).text("keep-alive"))
}
