//! Queue endpoints

use axum::extract::State;
use axum::http::StatusCode;
use kq_common::db::QueueEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{Json, Path};
use crate::error::Result;
use crate::queue::NewRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    /// Every unfinished entry id, in the new order
    pub order: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// 1-based target position
    pub position: i64,
}

#[derive(Debug, Serialize)]
pub struct NowPlayingResponse {
    pub current: Option<QueueEntry>,
}

/// GET /api/events/:id/queue
pub async fn list_queue(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.list_queue(id).await?))
}

/// GET /api/events/:id/queue/history
pub async fn list_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.list_history(id).await?))
}

/// POST /api/events/:id/queue
pub async fn add_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NewRequest>,
) -> Result<(StatusCode, Json<QueueEntry>)> {
    let entry = state.queue.add_request(id, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /api/events/:id/queue/order
pub async fn reorder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.reorder(id, &request.order).await?))
}

/// POST /api/events/:id/queue/:entry_id/move
pub async fn move_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Vec<QueueEntry>>> {
    Ok(Json(state.queue.move_entry(id, entry_id, request.position).await?))
}

/// DELETE /api/events/:id/queue/:entry_id
pub async fn remove_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.queue.remove_entry(id, entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/events/:id/queue/:entry_id/skip
pub async fn skip_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QueueEntry>> {
    Ok(Json(state.queue.skip_entry(id, entry_id).await?))
}

/// POST /api/events/:id/queue/:entry_id/play
pub async fn play_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QueueEntry>> {
    Ok(Json(state.queue.play_entry(id, entry_id).await?))
}

/// POST /api/events/:id/queue/next
pub async fn start_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NowPlayingResponse>> {
    let current = state.queue.start_next(id).await?;
    Ok(Json(NowPlayingResponse { current }))
}

/// POST /api/events/:id/queue/complete
pub async fn complete_current(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueEntry>> {
    Ok(Json(state.queue.complete_current(id).await?))
}

/// GET /api/events/:id/queue/current
pub async fn now_playing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NowPlayingResponse>> {
    let current = state.queue.now_playing(id).await?;
    Ok(Json(NowPlayingResponse { current }))
}
