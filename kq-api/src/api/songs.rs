//! Song catalog endpoints

use axum::extract::State;
use axum::http::StatusCode;
use kq_common::db::{Song, SongStatus};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use crate::catalog::NewSong;
use crate::db::songs::SongQuery;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub status: Option<SongStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub status: SongStatus,
    pub moderator: Option<String>,
}

/// GET /api/songs?q=&status=&limit=
pub async fn search_songs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Song>>> {
    let query = SongQuery {
        text: params.q,
        status: params.status,
        limit: params.limit,
    };
    Ok(Json(state.songs.search(&query).await?))
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<AppState>,
    Json(new): Json<NewSong>,
) -> Result<(StatusCode, Json<Song>)> {
    let song = state.songs.create(new).await?;
    Ok((StatusCode::CREATED, Json(song)))
}

/// GET /api/songs/:id
pub async fn get_song(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Song>> {
    Ok(Json(state.songs.get(id).await?))
}

/// POST /api/songs/:id/moderate
pub async fn moderate_song(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModerateRequest>,
) -> Result<Json<Song>> {
    Ok(Json(state.songs.moderate(id, request.status, request.moderator).await?))
}
