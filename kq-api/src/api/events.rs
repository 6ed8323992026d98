//! Event scheduling endpoints

use axum::extract::State;
use axum::http::StatusCode;
use kq_common::db::{Event, EventStatus};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use crate::db::events::EventFilter;
use crate::error::Result;
use crate::event_manager::{EventPatch, NewEvent};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub include_hidden: bool,
    #[serde(default)]
    pub include_canceled: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: EventStatus,
}

/// GET /api/events
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<Event>>> {
    let filter = EventFilter {
        status: query.status,
        include_hidden: query.include_hidden,
        include_canceled: query.include_canceled,
    };
    Ok(Json(state.events.list(&filter).await?))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    Json(new): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>)> {
    let event = state.events.create(new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/events/:id
pub async fn get_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Event>> {
    Ok(Json(state.events.get(id).await?))
}

/// GET /api/events/code/:code
pub async fn get_event_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Event>> {
    Ok(Json(state.events.get_by_code(&code).await?))
}

/// PATCH /api/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<Event>> {
    Ok(Json(state.events.update(id, patch).await?))
}

/// POST /api/events/:id/status
pub async fn set_event_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Event>> {
    Ok(Json(state.events.set_status(id, request.status).await?))
}

/// POST /api/events/:id/cancel
pub async fn cancel_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Event>> {
    Ok(Json(state.events.cancel(id).await?))
}
