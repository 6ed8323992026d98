//! HTTP API for kq-api
//!
//! JSON endpoints under `/api`, plus `/health`, `/build_info` and the SSE
//! stream at `/events`.

pub mod attendance;
pub mod buildinfo;
pub mod events;
pub mod extract;
pub mod health;
pub mod queue;
pub mod settings;
pub mod songs;
pub mod sse;

use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/code/:code", get(events::get_event_by_code))
        .route("/events/:id", get(events::get_event).patch(events::update_event))
        .route("/events/:id/status", post(events::set_event_status))
        .route("/events/:id/cancel", post(events::cancel_event))
        // Queue
        .route("/events/:id/queue", get(queue::list_queue).post(queue::add_request))
        .route("/events/:id/queue/history", get(queue::list_history))
        .route("/events/:id/queue/order", put(queue::reorder))
        .route("/events/:id/queue/current", get(queue::now_playing))
        .route("/events/:id/queue/next", post(queue::start_next))
        .route("/events/:id/queue/complete", post(queue::complete_current))
        .route("/events/:id/queue/:entry_id", delete(queue::remove_entry))
        .route("/events/:id/queue/:entry_id/move", post(queue::move_entry))
        .route("/events/:id/queue/:entry_id/skip", post(queue::skip_entry))
        .route("/events/:id/queue/:entry_id/play", post(queue::play_entry))
        // Attendance
        .route("/events/:id/attendance", get(attendance::list_attendance))
        .route("/events/:id/attendance/history", get(attendance::list_history))
        .route("/events/:id/attendance/:singer", get(attendance::get_attendance))
        .route("/events/:id/attendance/:singer/check-in", post(attendance::check_in))
        .route("/events/:id/attendance/:singer/check-out", post(attendance::check_out))
        .route("/events/:id/attendance/:singer/break/start", post(attendance::start_break))
        .route("/events/:id/attendance/:singer/break/end", post(attendance::end_break))
        // Song catalog
        .route("/songs", get(songs::search_songs).post(songs::create_song))
        .route("/songs/:id", get(songs::get_song))
        .route("/songs/:id/moderate", post(songs::moderate_song))
        // Settings
        .route("/settings", get(settings::list_settings))
        .route("/settings/:key", put(settings::update_setting));

    Router::new()
        .nest("/api", api)
        .merge(health::health_routes())
        .route("/build_info", get(buildinfo::get_build_info))
        .route("/events", get(sse::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
