//! Song catalog
//!
//! Singers suggest songs, which wait as `Pending` until a DJ approves or
//! declines them. Only `Active` songs can be queued.

use crate::db::{self, songs::{self, SongQuery}};
use crate::error::{Error, Result};
use kq_common::db::{Song, SongFeatures, SongStatus};
use kq_common::events::{EventBus, KaraokeEvent};
use kq_common::time;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    #[serde(flatten)]
    pub features: SongFeatures,
    pub requested_by: Option<String>,
    /// DJ-added songs skip moderation
    #[serde(default)]
    pub auto_approve: bool,
}

pub struct SongCatalog {
    db: SqlitePool,
    bus: EventBus,
}

impl SongCatalog {
    pub fn new(db: SqlitePool, bus: EventBus) -> Self {
        Self { db, bus }
    }

    pub async fn create(&self, new: NewSong) -> Result<Song> {
        let title = new.title.trim().to_string();
        let artist = new.artist.trim().to_string();
        if title.is_empty() || artist.is_empty() {
            return Err(Error::BadRequest("Title and artist are required".to_string()));
        }
        new.features.validate()?;

        let now = time::now();
        let song = Song {
            id: Uuid::new_v4(),
            title,
            artist,
            genre: new.genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
            features: new.features,
            status: if new.auto_approve {
                SongStatus::Active
            } else {
                SongStatus::Pending
            },
            requested_by: new.requested_by,
            approved_by: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.acquire().await?;
        songs::insert_song(&mut conn, &song).await?;

        info!("Added song '{}' by {} as {}", song.title, song.artist, song.status);
        Ok(song)
    }

    pub async fn get(&self, song_id: Uuid) -> Result<Song> {
        let mut conn = self.db.acquire().await?;
        songs::get_song(&mut conn, song_id).await
    }

    pub async fn search(&self, query: &SongQuery) -> Result<Vec<Song>> {
        let mut conn = self.db.acquire().await?;
        songs::search_songs(&mut conn, query).await
    }

    /// Approve or decline a song
    pub async fn moderate(&self, song_id: Uuid, status: SongStatus, moderator: Option<String>) -> Result<Song> {
        let mut tx = db::begin_write(&self.db).await?;
        let song = songs::get_song(&mut tx, song_id).await?;
        if !song.status.can_transition_to(status) {
            return Err(Error::Conflict(format!(
                "Song '{}' cannot go from {} to {}",
                song.title, song.status, status
            )));
        }

        let now = time::now();
        songs::set_status(&mut tx, song_id, status, moderator.as_deref(), now).await?;
        let updated = songs::get_song(&mut tx, song_id).await?;
        tx.commit().await?;

        info!("Song '{}' moderated to {}", updated.title, status);
        self.bus.emit_lossy(KaraokeEvent::SongModerated {
            song_id,
            status,
            timestamp: now,
        });
        Ok(updated)
    }
}
