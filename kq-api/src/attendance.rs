//! Attendance and break-state tracking
//!
//! A singer's presence decides whether their queued entries can be called
//! up. Every change is appended to the attendance history and mirrored onto
//! the singer's unfinished entries in the same transaction.

use crate::db::{self, attendance, events, queue};
use crate::error::{Error, Result};
use crate::queue::{load_open_event, EventLocks};
use chrono::{DateTime, Utc};
use kq_common::db::{Attendance, AttendanceAction, AttendanceHistory};
use kq_common::events::{EventBus, KaraokeEvent, QueueChangeTrigger};
use kq_common::time;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Compute the attendance row after `action`
///
/// `Ok(None)` means the action changes nothing and records no history.
fn next_state(
    current: Option<&Attendance>,
    event_id: Uuid,
    singer: &str,
    action: AttendanceAction,
    now: DateTime<Utc>,
) -> Result<Option<Attendance>> {
    let checked_in = current.map(|a| a.is_checked_in).unwrap_or(false);
    let on_break = current.map(|a| a.is_on_break).unwrap_or(false);

    let mut next = match current {
        Some(a) => a.clone(),
        None => Attendance {
            id: Uuid::new_v4(),
            event_id,
            singer: singer.to_string(),
            is_checked_in: false,
            is_on_break: false,
            break_start_at: None,
            break_end_at: None,
            updated_at: now,
        },
    };

    match action {
        AttendanceAction::CheckIn => {
            if checked_in && !on_break {
                return Ok(None);
            }
            next.is_checked_in = true;
            next.is_on_break = false;
            next.break_start_at = None;
            next.break_end_at = None;
        }
        AttendanceAction::CheckOut => {
            if !checked_in {
                return Err(Error::Conflict(format!("{} is not checked in", singer)));
            }
            if on_break {
                next.break_end_at = Some(now);
            }
            next.is_checked_in = false;
            next.is_on_break = false;
        }
        AttendanceAction::BreakStart => {
            if !checked_in {
                return Err(Error::Conflict(format!(
                    "{} must be checked in to take a break",
                    singer
                )));
            }
            if on_break {
                return Err(Error::Conflict(format!("{} is already on break", singer)));
            }
            next.is_on_break = true;
            next.break_start_at = Some(now);
            next.break_end_at = None;
        }
        AttendanceAction::BreakEnd => {
            if !on_break {
                return Err(Error::Conflict(format!("{} is not on break", singer)));
            }
            next.is_on_break = false;
            next.break_end_at = Some(now);
        }
    }

    next.updated_at = now;
    Ok(Some(next))
}

pub struct AttendanceTracker {
    db: SqlitePool,
    bus: EventBus,
    locks: Arc<EventLocks>,
}

impl AttendanceTracker {
    pub fn new(db: SqlitePool, bus: EventBus, locks: Arc<EventLocks>) -> Self {
        Self { db, bus, locks }
    }

    pub async fn check_in(&self, event_id: Uuid, singer: &str) -> Result<Attendance> {
        self.apply(event_id, singer, AttendanceAction::CheckIn).await
    }

    pub async fn check_out(&self, event_id: Uuid, singer: &str) -> Result<Attendance> {
        self.apply(event_id, singer, AttendanceAction::CheckOut).await
    }

    pub async fn start_break(&self, event_id: Uuid, singer: &str) -> Result<Attendance> {
        self.apply(event_id, singer, AttendanceAction::BreakStart).await
    }

    pub async fn end_break(&self, event_id: Uuid, singer: &str) -> Result<Attendance> {
        self.apply(event_id, singer, AttendanceAction::BreakEnd).await
    }

    pub async fn get(&self, event_id: Uuid, singer: &str) -> Result<Attendance> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        attendance::find_attendance(&mut conn, event_id, singer.trim())
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("No attendance for {} at event {}", singer, event_id))
            })
    }

    pub async fn list(&self, event_id: Uuid) -> Result<Vec<Attendance>> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        attendance::list_attendance(&mut conn, event_id).await
    }

    /// Chronological history, optionally for one singer
    pub async fn history(&self, event_id: Uuid, singer: Option<&str>) -> Result<Vec<AttendanceHistory>> {
        let mut conn = self.db.acquire().await?;
        events::get_event(&mut conn, event_id).await?;
        attendance::list_history(&mut conn, event_id, singer.map(str::trim)).await
    }

    async fn apply(&self, event_id: Uuid, singer: &str, action: AttendanceAction) -> Result<Attendance> {
        let singer = singer.trim();
        if singer.is_empty() {
            return Err(Error::BadRequest("Singer must not be empty".to_string()));
        }

        let _guard = self.locks.acquire(event_id).await;
        let mut tx = db::begin_write(&self.db).await?;

        load_open_event(&mut tx, event_id).await?;
        let current = attendance::find_attendance(&mut tx, event_id, singer).await?;
        let now = time::now();

        let next = match next_state(current.as_ref(), event_id, singer, action, now)? {
            Some(next) => next,
            None => {
                debug!("{} already checked in to event {}", singer, event_id);
                return current.ok_or_else(|| {
                    Error::Internal(format!("No attendance row for {} after no-op", singer))
                });
            }
        };

        let stored = attendance::upsert_attendance(&mut tx, &next).await?;
        attendance::record_history(&mut tx, &stored, action, now).await?;

        let (is_active, is_on_break) = stored.queue_flags();
        let synced =
            queue::sync_requestor_flags(&mut tx, event_id, singer, is_active, is_on_break, now).await?;
        let queue_count = queue::count_unfinished(&mut tx, event_id).await?;
        tx.commit().await?;

        match (action, current.as_ref().and_then(|a| a.break_start_at)) {
            (AttendanceAction::BreakEnd, Some(started)) => info!(
                "{} back from a {} min break at event {}",
                singer,
                time::minutes_between(started, now),
                event_id
            ),
            _ => info!("{} {} at event {}", singer, action, event_id),
        }
        self.bus.emit_lossy(KaraokeEvent::AttendanceChanged {
            event_id,
            singer: singer.to_string(),
            action,
            timestamp: now,
        });
        if synced > 0 {
            debug!("Updated {} queue entries for {}", synced, singer);
            self.bus.emit_lossy(KaraokeEvent::QueueChanged {
                event_id,
                trigger: QueueChangeTrigger::AttendanceSync,
                queue_count,
                timestamp: now,
            });
        }

        Ok(stored)
    }
}
