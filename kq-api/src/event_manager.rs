//! Karaoke event lifecycle
//!
//! Scheduling, editing, status transitions and cancellation. Archiving or
//! canceling an event closes it out: unfinished entries are archived and
//! everyone still present is checked out.

use crate::db::events::{self, EventFilter};
use crate::db::{self, attendance, queue, settings};
use crate::error::{Error, Result};
use crate::queue::EventLocks;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kq_common::db::{AttendanceAction, Event, EventStatus, Visibility};
use kq_common::events::{EventBus, KaraokeEvent, QueueChangeTrigger};
use kq_common::time;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Fields accepted when scheduling an event
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_start_time: Option<NaiveTime>,
    pub scheduled_end_time: Option<NaiveTime>,
    pub dj_name: Option<String>,
    /// Falls back to the `default_request_limit` setting
    pub request_limit: Option<i64>,
}

fn default_visibility() -> Visibility {
    Visibility::Visible
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub code: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub location: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_start_time: Option<NaiveTime>,
    pub scheduled_end_time: Option<NaiveTime>,
    pub dj_name: Option<String>,
    pub request_limit: Option<i64>,
}

/// What closing an event cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOut {
    pub archived_entries: u64,
    pub checked_out: usize,
    pub had_current: bool,
}

/// Archive every unfinished entry and check out everyone present
pub async fn close_out(conn: &mut SqliteConnection, event_id: Uuid, now: DateTime<Utc>) -> Result<CloseOut> {
    let had_current = queue::get_current(conn, event_id).await?.is_some();
    let archived_entries = queue::archive_all_unfinished(conn, event_id, now).await?;

    let present = attendance::list_checked_in(conn, event_id).await?;
    for mut singer in present.iter().cloned() {
        if singer.is_on_break {
            singer.break_end_at = Some(now);
        }
        singer.is_checked_in = false;
        singer.is_on_break = false;
        singer.updated_at = now;
        let stored = attendance::upsert_attendance(conn, &singer).await?;
        attendance::record_history(conn, &stored, AttendanceAction::CheckOut, now).await?;
    }

    events::refresh_queue_count(conn, event_id).await?;

    Ok(CloseOut {
        archived_entries,
        checked_out: present.len(),
        had_current,
    })
}

pub struct EventManager {
    db: SqlitePool,
    bus: EventBus,
    locks: Arc<EventLocks>,
}

impl EventManager {
    pub fn new(db: SqlitePool, bus: EventBus, locks: Arc<EventLocks>) -> Self {
        Self { db, bus, locks }
    }

    pub async fn create(&self, new: NewEvent) -> Result<Event> {
        let request_limit = match new.request_limit {
            Some(limit) => limit,
            None => settings::get_default_request_limit(&self.db).await?,
        };

        let now = time::now();
        let event = Event {
            id: Uuid::new_v4(),
            code: new.code.trim().to_string(),
            description: new.description,
            status: EventStatus::Upcoming,
            visibility: new.visibility,
            location: new.location,
            scheduled_date: new.scheduled_date,
            scheduled_start_time: new.scheduled_start_time,
            scheduled_end_time: new.scheduled_end_time,
            dj_name: new.dj_name,
            is_canceled: false,
            request_limit,
            queue_count: 0,
            created_at: now,
            updated_at: now,
        };
        event.validate()?;

        let mut tx = db::begin_write(&self.db).await?;
        if events::find_event_by_code(&mut tx, &event.code).await?.is_some() {
            return Err(Error::Conflict(format!("Event code already in use: {}", event.code)));
        }
        events::insert_event(&mut tx, &event).await?;
        tx.commit().await?;

        info!("Created event {} ({}) on {}", event.code, event.id, event.scheduled_date);
        self.bus.emit_lossy(KaraokeEvent::EventCreated {
            event_id: event.id,
            code: event.code.clone(),
            timestamp: now,
        });
        Ok(event)
    }

    pub async fn get(&self, event_id: Uuid) -> Result<Event> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Event> {
        let mut conn = self.db.acquire().await?;
        events::find_event_by_code(&mut conn, code.trim())
            .await?
            .ok_or_else(|| Error::NotFound(format!("Event not found: {}", code)))
    }

    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut conn = self.db.acquire().await?;
        events::list_events(&mut conn, filter).await
    }

    pub async fn update(&self, event_id: Uuid, patch: EventPatch) -> Result<Event> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        let mut event = events::get_event(&mut tx, event_id).await?;
        if event.is_closed() {
            return Err(Error::EventClosed(format!("Event {} can no longer be edited", event.code)));
        }

        if let Some(code) = patch.code {
            let code = code.trim().to_string();
            if code != event.code {
                if events::find_event_by_code(&mut tx, &code).await?.is_some() {
                    return Err(Error::Conflict(format!("Event code already in use: {}", code)));
                }
                event.code = code;
            }
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(visibility) = patch.visibility {
            event.visibility = visibility;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        if let Some(date) = patch.scheduled_date {
            event.scheduled_date = date;
        }
        if let Some(start) = patch.scheduled_start_time {
            event.scheduled_start_time = Some(start);
        }
        if let Some(end) = patch.scheduled_end_time {
            event.scheduled_end_time = Some(end);
        }
        if let Some(dj) = patch.dj_name {
            event.dj_name = Some(dj);
        }
        if let Some(limit) = patch.request_limit {
            event.request_limit = limit;
        }
        event.validate()?;

        event.updated_at = time::now();
        events::update_event(&mut tx, &event).await?;
        tx.commit().await?;

        info!("Updated event {} ({})", event.code, event.id);
        self.bus.emit_lossy(KaraokeEvent::EventUpdated {
            event_id,
            timestamp: event.updated_at,
        });
        Ok(event)
    }

    /// Move an event through Upcoming → Live → Archived
    pub async fn set_status(&self, event_id: Uuid, status: EventStatus) -> Result<Event> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        let event = events::get_event(&mut tx, event_id).await?;
        if event.is_canceled {
            return Err(Error::EventClosed(format!("Event {} is canceled", event.code)));
        }
        if event.status == status {
            return Ok(event);
        }
        if !event.status.can_transition_to(status) {
            return Err(Error::Conflict(format!(
                "Event {} cannot go from {} to {}",
                event.code, event.status, status
            )));
        }

        let now = time::now();
        events::set_status(&mut tx, event_id, status, now).await?;
        let closed = match status {
            EventStatus::Archived => Some(close_out(&mut tx, event_id, now).await?),
            _ => None,
        };
        let updated = events::get_event(&mut tx, event_id).await?;
        tx.commit().await?;

        info!("Event {} is now {}", updated.code, status);
        self.bus.emit_lossy(KaraokeEvent::EventStatusChanged {
            event_id,
            old_status: event.status,
            new_status: status,
            timestamp: now,
        });
        if let Some(closed) = closed {
            self.announce_close_out(event_id, closed, now);
        }
        Ok(updated)
    }

    /// Cancel an event; canceling twice is a no-op
    pub async fn cancel(&self, event_id: Uuid) -> Result<Event> {
        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        let event = events::get_event(&mut tx, event_id).await?;
        if event.is_canceled {
            return Ok(event);
        }

        let now = time::now();
        events::set_canceled(&mut tx, event_id, now).await?;
        let closed = close_out(&mut tx, event_id, now).await?;
        let updated = events::get_event(&mut tx, event_id).await?;
        tx.commit().await?;

        info!(
            "Canceled event {}: {} entries archived, {} singers checked out",
            updated.code, closed.archived_entries, closed.checked_out
        );
        self.bus.emit_lossy(KaraokeEvent::EventCanceled {
            event_id,
            timestamp: now,
        });
        self.announce_close_out(event_id, closed, now);
        Ok(updated)
    }

    fn announce_close_out(&self, event_id: Uuid, closed: CloseOut, now: DateTime<Utc>) {
        if closed.archived_entries > 0 {
            self.bus.emit_lossy(KaraokeEvent::QueueChanged {
                event_id,
                trigger: QueueChangeTrigger::EventClosed,
                queue_count: 0,
                timestamp: now,
            });
        }
        if closed.had_current {
            self.bus.emit_lossy(KaraokeEvent::NowPlayingChanged {
                event_id,
                queue_entry_id: None,
                song_id: None,
                timestamp: now,
            });
        }
    }
}
