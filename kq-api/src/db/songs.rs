//! Song catalog queries

use super::{parse_guid, parse_text};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use kq_common::db::{Song, SongFeatures, SongStatus};
use sqlx::SqliteConnection;
use uuid::Uuid;

const SONG_COLUMNS: &str = r#"
    guid, title, artist, genre, bpm, energy, valence, danceability, popularity,
    status, requested_by, approved_by, created_at, updated_at
"#;

/// Upper bound on search results
pub const MAX_SEARCH_LIMIT: i64 = 200;

#[derive(sqlx::FromRow)]
struct SongRow {
    guid: String,
    title: String,
    artist: String,
    genre: Option<String>,
    bpm: Option<f64>,
    energy: Option<f64>,
    valence: Option<f64>,
    danceability: Option<f64>,
    popularity: Option<i64>,
    status: String,
    requested_by: Option<String>,
    approved_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SongRow> for Song {
    type Error = Error;

    fn try_from(row: SongRow) -> Result<Self> {
        Ok(Song {
            id: parse_guid("songs.guid", &row.guid)?,
            title: row.title,
            artist: row.artist,
            genre: row.genre,
            features: SongFeatures {
                bpm: row.bpm,
                energy: row.energy,
                valence: row.valence,
                danceability: row.danceability,
                popularity: row.popularity,
            },
            status: parse_text("songs.status", &row.status)?,
            requested_by: row.requested_by,
            approved_by: row.approved_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Catalog search parameters
#[derive(Debug, Clone, Default)]
pub struct SongQuery {
    /// Case-insensitive substring over title and artist
    pub text: Option<String>,
    pub status: Option<SongStatus>,
    pub limit: Option<i64>,
}

pub async fn insert_song(conn: &mut SqliteConnection, song: &Song) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO songs (
            guid, title, artist, genre, bpm, energy, valence, danceability, popularity,
            status, requested_by, approved_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(song.id.to_string())
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.genre)
    .bind(song.features.bpm)
    .bind(song.features.energy)
    .bind(song.features.valence)
    .bind(song.features.danceability)
    .bind(song.features.popularity)
    .bind(song.status.as_str())
    .bind(&song.requested_by)
    .bind(&song.approved_by)
    .bind(song.created_at)
    .bind(song.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_song(conn: &mut SqliteConnection, song_id: Uuid) -> Result<Song> {
    let sql = format!("SELECT {} FROM songs WHERE guid = ?", SONG_COLUMNS);
    let row = sqlx::query_as::<_, SongRow>(&sql)
        .bind(song_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Song not found: {}", song_id)))?;

    Song::try_from(row)
}

/// Search by title/artist, ordered by artist then title
pub async fn search_songs(conn: &mut SqliteConnection, query: &SongQuery) -> Result<Vec<Song>> {
    let limit = query.limit.unwrap_or(50).clamp(1, MAX_SEARCH_LIMIT);
    let pattern = query
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", escape_like(&t.to_lowercase())));
    let status = query.status.map(|s| s.as_str());

    let sql = format!(
        r#"
        SELECT {} FROM songs
        WHERE (? IS NULL OR lower(title) LIKE ? ESCAPE '\' OR lower(artist) LIKE ? ESCAPE '\')
          AND (? IS NULL OR status = ?)
        ORDER BY artist COLLATE NOCASE ASC, title COLLATE NOCASE ASC
        LIMIT ?
        "#,
        SONG_COLUMNS
    );

    let rows = sqlx::query_as::<_, SongRow>(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(status)
        .bind(status)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(Song::try_from).collect()
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    song_id: Uuid,
    status: SongStatus,
    moderator: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE songs SET status = ?, approved_by = ?, updated_at = ? WHERE guid = ?",
    )
    .bind(status.as_str())
    .bind(moderator)
    .bind(now)
    .bind(song_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Song not found: {}", song_id)));
    }
    Ok(())
}

/// Escape LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
