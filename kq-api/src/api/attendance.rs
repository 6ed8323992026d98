//! Attendance endpoints
//!
//! Singers are addressed by their identity string in the path.

use axum::extract::State;
use kq_common::db::{Attendance, AttendanceHistory};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub singer: Option<String>,
}

/// GET /api/events/:id/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Attendance>>> {
    Ok(Json(state.attendance.list(id).await?))
}

/// GET /api/events/:id/attendance/history?singer=
pub async fn list_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AttendanceHistory>>> {
    Ok(Json(state.attendance.history(id, query.singer.as_deref()).await?))
}

/// GET /api/events/:id/attendance/:singer
pub async fn get_attendance(
    State(state): State<AppState>,
    Path((id, singer)): Path<(Uuid, String)>,
) -> Result<Json<Attendance>> {
    Ok(Json(state.attendance.get(id, &singer).await?))
}

/// POST /api/events/:id/attendance/:singer/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Path((id, singer)): Path<(Uuid, String)>,
) -> Result<Json<Attendance>> {
    Ok(Json(state.attendance.check_in(id, &singer).await?))
}

/// POST /api/events/:id/attendance/:singer/check-out
pub async fn check_out(
    State(state): State<AppState>,
    Path((id, singer)): Path<(Uuid, String)>,
) -> Result<Json<Attendance>> {
    Ok(Json(state.attendance.check_out(id, &singer).await?))
}

/// POST /api/events/:id/attendance/:singer/break/start
pub async fn start_break(
    State(state): State<AppState>,
    Path((id, singer)): Path<(Uuid, String)>,
) -> Result<Json<Attendance>> {
    Ok(Json(state.attendance.start_break(id, &singer).await?))
}

/// POST /api/events/:id/attendance/:singer/break/end
pub async fn end_break(
    State(state): State<AppState>,
    Path((id, singer)): Path<(Uuid, String)>,
) -> Result<Json<Attendance>> {
    Ok(Json(state.attendance.end_break(id, &singer).await?))
}
