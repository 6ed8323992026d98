//! Queue manager
//!
//! Applies requests, reorders, skips and stage changes to an event's queue.
//! Each mutation holds the event's lock for its whole transaction and
//! broadcasts a `QueueChanged` notification after commit.

use super::locks::EventLocks;
use super::ordering;
use crate::db::{self, attendance, events, queue, songs};
use crate::error::{Error, Result};
use kq_common::db::{queue_flags_for, Event, QueueEntry, QueueStatus, SongStatus};
use kq_common::events::{EventBus, KaraokeEvent, QueueChangeTrigger};
use kq_common::time;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A singer's song request
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub song_id: Uuid,
    pub requestor: String,
    /// Everyone on stage; defaults to just the requestor
    #[serde(default)]
    pub singers: Vec<String>,
}

/// Load an event and reject it if canceled or archived
pub async fn load_open_event(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Event> {
    let event = events::get_event(conn, event_id).await?;
    if event.is_canceled {
        return Err(Error::EventClosed(format!("Event {} is canceled", event.code)));
    }
    if event.is_closed() {
        return Err(Error::EventClosed(format!("Event {} is archived", event.code)));
    }
    Ok(event)
}

/// Load an unfinished entry belonging to `event_id`
async fn load_queued_entry(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    entry_id: Uuid,
) -> Result<QueueEntry> {
    let entry = queue::get_entry(conn, entry_id).await?;
    if entry.event_id != event_id {
        return Err(Error::NotFound(format!(
            "Queue entry {} not found in event {}",
            entry_id, event_id
        )));
    }
    if entry.is_finished() {
        return Err(Error::Conflict(format!("Queue entry {} is already archived", entry_id)));
    }
    Ok(entry)
}

/// Rewrite positions to match the current order with gaps closed
async fn compact(conn: &mut SqliteConnection, event_id: Uuid) -> Result<()> {
    let remaining = queue::list_unfinished(conn, event_id).await?;
    let ids: Vec<Uuid> = remaining.iter().map(|e| e.id).collect();
    queue::write_positions(conn, event_id, &ids, time::now()).await
}

pub struct QueueManager {
    db: SqlitePool,
    bus: EventBus,
    locks: Arc<EventLocks>,
}

impl QueueManager {
    pub fn new(db: SqlitePool, bus: EventBus, locks: Arc<EventLocks>) -> Self {
        Self { db, bus, locks }
    }

    /// Unfinished entries ordered by position
    pub async fn list_queue(&self, event_id: Uuid) -> Result<Vec<QueueEntry>> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        queue::list_unfinished(&mut conn, event_id).await
    }

    /// Archived entries, most recent first
    pub async fn list_history(&self, event_id: Uuid) -> Result<Vec<QueueEntry>> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        queue::list_archived(&mut conn, event_id).await
    }

    pub async fn now_playing(&self, event_id: Uuid) -> Result<Option<QueueEntry>> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        queue::get_current(&mut conn, event_id).await
    }

    /// Append a request at the end of the queue
    pub async fn add_request(&self, event_id: Uuid, request: NewRequest) -> Result<QueueEntry> {
        let requestor = request.requestor.trim().to_string();
        if requestor.is_empty() {
            return Err(Error::BadRequest("Requestor must not be empty".to_string()));
        }
        let mut singers: Vec<String> = request
            .singers
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if singers.is_empty() {
            singers.push(requestor.clone());
        }

        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        let event = load_open_event(&mut tx, event_id).await?;

        let song = songs::get_song(&mut tx, request.song_id).await?;
        if song.status != SongStatus::Active {
            return Err(Error::Conflict(format!(
                "Song '{}' is {} and cannot be requested",
                song.title, song.status
            )));
        }

        let held = queue::count_unfinished_for_requestor(&mut tx, event_id, &requestor).await?;
        if held >= event.request_limit {
            return Err(Error::Conflict(format!(
                "{} already has {} of {} allowed requests queued",
                requestor, held, event.request_limit
            )));
        }

        let presence = attendance::find_attendance(&mut tx, event_id, &requestor).await?;
        let (is_active, is_on_break) = queue_flags_for(presence.as_ref());

        let now = time::now();
        let entry = QueueEntry {
            id: Uuid::new_v4(),
            event_id,
            song_id: song.id,
            requestor,
            singers,
            position: Some(queue::count_unfinished(&mut tx, event_id).await? + 1),
            status: QueueStatus::Upcoming,
            is_active,
            was_skipped: false,
            is_current: false,
            is_on_break,
            sung_at: None,
            created_at: now,
            updated_at: now,
        };
        queue::insert_entry(&mut tx, &entry).await?;
        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        tx.commit().await?;

        info!(
            "Queued '{}' for {} at position {} in event {}",
            song.title,
            entry.requestor,
            entry.position.unwrap_or_default(),
            event.code
        );
        self.notify_queue(event_id, QueueChangeTrigger::Request, count);
        Ok(entry)
    }

    /// Replace the whole order; `new_order` must name every unfinished entry once
    pub async fn reorder(&self, event_id: Uuid, new_order: &[Uuid]) -> Result<Vec<QueueEntry>> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let current: Vec<Uuid> = queue::list_unfinished(&mut tx, event_id)
            .await?
            .iter()
            .map(|e| e.id)
            .collect();
        ordering::validate_new_order(&current, new_order)?;

        queue::write_positions(&mut tx, event_id, new_order, time::now()).await?;
        let entries = queue::list_unfinished(&mut tx, event_id).await?;
        tx.commit().await?;

        debug!("Reordered {} entries in event {}", entries.len(), event_id);
        self.notify_queue(event_id, QueueChangeTrigger::Reorder, entries.len() as i64);
        Ok(entries)
    }

    /// Move one entry to a 1-based position
    pub async fn move_entry(
        &self,
        event_id: Uuid,
        entry_id: Uuid,
        new_position: i64,
    ) -> Result<Vec<QueueEntry>> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        load_queued_entry(&mut tx, event_id, entry_id).await?;

        let current: Vec<Uuid> = queue::list_unfinished(&mut tx, event_id)
            .await?
            .iter()
            .map(|e| e.id)
            .collect();
        let reordered = ordering::move_to(&current, entry_id, new_position)?;

        queue::write_positions(&mut tx, event_id, &reordered, time::now()).await?;
        let entries = queue::list_unfinished(&mut tx, event_id).await?;
        tx.commit().await?;

        debug!("Moved entry {} to position {} in event {}", entry_id, new_position, event_id);
        self.notify_queue(event_id, QueueChangeTrigger::Move, entries.len() as i64);
        Ok(entries)
    }

    /// Delete an unfinished entry and close the gap it leaves
    pub async fn remove_entry(&self, event_id: Uuid, entry_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let entry = load_queued_entry(&mut tx, event_id, entry_id).await?;

        queue::delete_entry(&mut tx, entry_id).await?;
        compact(&mut tx, event_id).await?;
        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        tx.commit().await?;

        info!("Removed entry {} ({}) from event {}", entry_id, entry.requestor, event_id);
        self.notify_queue(event_id, QueueChangeTrigger::Remove, count);
        if entry.is_current {
            self.notify_now_playing(event_id, None);
        }
        Ok(())
    }

    /// Archive an entry as skipped
    pub async fn skip_entry(&self, event_id: Uuid, entry_id: Uuid) -> Result<QueueEntry> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let entry = load_queued_entry(&mut tx, event_id, entry_id).await?;

        queue::archive_entry(&mut tx, entry_id, true, None, time::now()).await?;
        compact(&mut tx, event_id).await?;
        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        let skipped = queue::get_entry(&mut tx, entry_id).await?;
        tx.commit().await?;

        info!("Skipped entry {} ({}) in event {}", entry_id, entry.requestor, event_id);
        self.notify_queue(event_id, QueueChangeTrigger::Skip, count);
        if entry.is_current {
            self.notify_now_playing(event_id, None);
        }
        Ok(skipped)
    }

    /// Finish the current performance and call up the next eligible singer
    ///
    /// Returns the new current entry, or `None` when nobody is eligible.
    pub async fn start_next(&self, event_id: Uuid) -> Result<Option<QueueEntry>> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let now = time::now();

        let previous = queue::get_current(&mut tx, event_id).await?;
        if let Some(ref finished) = previous {
            queue::archive_entry(&mut tx, finished.id, false, Some(now), now).await?;
            compact(&mut tx, event_id).await?;
        }

        let remaining = queue::list_unfinished(&mut tx, event_id).await?;
        let next_id = ordering::next_eligible(&remaining).map(|e| e.id);
        let next = match next_id {
            Some(id) => {
                queue::set_current(&mut tx, id, now).await?;
                Some(queue::get_entry(&mut tx, id).await?)
            }
            None => None,
        };

        if previous.is_none() && next.is_none() {
            debug!("No eligible entry to start in event {}", event_id);
            return Ok(None);
        }

        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        tx.commit().await?;

        match &next {
            Some(entry) => info!(
                "Now singing in event {}: {} (entry {})",
                event_id, entry.requestor, entry.id
            ),
            None => info!("Queue of event {} has no eligible singer", event_id),
        }
        self.notify_queue(event_id, QueueChangeTrigger::Advance, count);
        self.notify_now_playing(event_id, next.as_ref());
        Ok(next)
    }

    /// Put a specific entry on stage, out of order
    ///
    /// The entry that was current goes back to waiting at its position.
    pub async fn play_entry(&self, event_id: Uuid, entry_id: Uuid) -> Result<QueueEntry> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let entry = load_queued_entry(&mut tx, event_id, entry_id).await?;
        if entry.is_current {
            return Ok(entry);
        }

        let now = time::now();
        if let Some(previous) = queue::get_current(&mut tx, event_id).await? {
            queue::demote_current(&mut tx, previous.id, now).await?;
        }
        queue::set_current(&mut tx, entry_id, now).await?;
        let playing = queue::get_entry(&mut tx, entry_id).await?;
        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        tx.commit().await?;

        info!("DJ override in event {}: {} (entry {})", event_id, playing.requestor, entry_id);
        self.notify_queue(event_id, QueueChangeTrigger::Override, count);
        self.notify_now_playing(event_id, Some(&playing));
        Ok(playing)
    }

    /// Archive the current entry as sung without calling anyone up
    pub async fn complete_current(&self, event_id: Uuid) -> Result<QueueEntry> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let current = queue::get_current(&mut tx, event_id)
            .await?
            .ok_or_else(|| Error::Conflict(format!("Nothing is playing in event {}", event_id)))?;

        let now = time::now();
        queue::archive_entry(&mut tx, current.id, false, Some(now), now).await?;
        compact(&mut tx, event_id).await?;
        let count = events::refresh_queue_count(&mut tx, event_id).await?;
        let finished = queue::get_entry(&mut tx, current.id).await?;
        tx.commit().await?;

        info!("Completed entry {} ({}) in event {}", finished.id, finished.requestor, event_id);
        self.notify_queue(event_id, QueueChangeTrigger::Complete, count);
        self.notify_now_playing(event_id, None);
        Ok(finished)
    }

    fn notify_queue(&self, event_id: Uuid, trigger: QueueChangeTrigger, queue_count: i64) {
        self.bus.emit_lossy(KaraokeEvent::QueueChanged {
            event_id,
            trigger,
            queue_count,
            timestamp: time::now(),
        });
    }

    fn notify_now_playing(&self, event_id: Uuid, entry: Option<&QueueEntry>) {
        self.bus.emit_lossy(KaraokeEvent::NowPlayingChanged {
            event_id,
            queue_entry_id: entry.map(|e| e.id),
            song_id: entry.map(|e| e.song_id),
            timestamp: time::now(),
        });
    }
}
