//! Event table queries

use super::{parse_guid, parse_text};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kq_common::db::{Event, EventStatus};
use sqlx::SqliteConnection;
use uuid::Uuid;

const EVENT_COLUMNS: &str = r#"
    guid, code, description, status, visibility, location,
    scheduled_date, scheduled_start_time, scheduled_end_time,
    dj_name, is_canceled, request_limit, queue_count,
    created_at, updated_at
"#;

/// Map a violated `code` uniqueness constraint to a conflict
fn code_taken(code: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::Conflict(format!("Event code already in use: {}", code))
        }
        other => Error::Database(other),
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    guid: String,
    code: String,
    description: String,
    status: String,
    visibility: String,
    location: String,
    scheduled_date: NaiveDate,
    scheduled_start_time: Option<NaiveTime>,
    scheduled_end_time: Option<NaiveTime>,
    dj_name: Option<String>,
    is_canceled: bool,
    request_limit: i64,
    queue_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Event {
            id: parse_guid("events.guid", &row.guid)?,
            code: row.code,
            description: row.description,
            status: parse_text("events.status", &row.status)?,
            visibility: parse_text("events.visibility", &row.visibility)?,
            location: row.location,
            scheduled_date: row.scheduled_date,
            scheduled_start_time: row.scheduled_start_time,
            scheduled_end_time: row.scheduled_end_time,
            dj_name: row.dj_name,
            is_canceled: row.is_canceled,
            request_limit: row.request_limit,
            queue_count: row.queue_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub include_hidden: bool,
    pub include_canceled: bool,
}

pub async fn insert_event(conn: &mut SqliteConnection, event: &Event) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO events (
            guid, code, description, status, visibility, location,
            scheduled_date, scheduled_start_time, scheduled_end_time,
            dj_name, is_canceled, request_limit, queue_count,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.code)
    .bind(&event.description)
    .bind(event.status.as_str())
    .bind(event.visibility.as_str())
    .bind(&event.location)
    .bind(event.scheduled_date)
    .bind(event.scheduled_start_time)
    .bind(event.scheduled_end_time)
    .bind(&event.dj_name)
    .bind(event.is_canceled)
    .bind(event.request_limit)
    .bind(event.queue_count)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| code_taken(&event.code, e))?;

    Ok(())
}

/// Get an event by ID
pub async fn get_event(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Event> {
    find_event(conn, event_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Event not found: {}", event_id)))
}

pub async fn find_event(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Option<Event>> {
    let sql = format!("SELECT {} FROM events WHERE guid = ?", EVENT_COLUMNS);
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(event_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Event::try_from).transpose()
}

pub async fn find_event_by_code(conn: &mut SqliteConnection, code: &str) -> Result<Option<Event>> {
    let sql = format!("SELECT {} FROM events WHERE code = ?", EVENT_COLUMNS);
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Event::try_from).transpose()
}

/// List events ordered by schedule, then code
pub async fn list_events(conn: &mut SqliteConnection, filter: &EventFilter) -> Result<Vec<Event>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM events
        WHERE (? IS NULL OR status = ?)
          AND (? = 1 OR visibility = 'Visible')
          AND (? = 1 OR is_canceled = 0)
        ORDER BY scheduled_date ASC,
                 scheduled_start_time IS NULL, scheduled_start_time ASC,
                 code ASC
        "#,
        EVENT_COLUMNS
    );

    let status = filter.status.map(|s| s.as_str());
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(status)
        .bind(status)
        .bind(filter.include_hidden)
        .bind(filter.include_canceled)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(Event::try_from).collect()
}

/// Write back every caller-editable column of `event`
pub async fn update_event(conn: &mut SqliteConnection, event: &Event) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE events
        SET code = ?, description = ?, visibility = ?, location = ?,
            scheduled_date = ?, scheduled_start_time = ?, scheduled_end_time = ?,
            dj_name = ?, request_limit = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&event.code)
    .bind(&event.description)
    .bind(event.visibility.as_str())
    .bind(&event.location)
    .bind(event.scheduled_date)
    .bind(event.scheduled_start_time)
    .bind(event.scheduled_end_time)
    .bind(&event.dj_name)
    .bind(event.request_limit)
    .bind(event.updated_at)
    .bind(event.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| code_taken(&event.code, e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Event not found: {}", event.id)));
    }
    Ok(())
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    status: EventStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE events SET status = ?, updated_at = ? WHERE guid = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(event_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_canceled(conn: &mut SqliteConnection, event_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE events SET is_canceled = 1, updated_at = ? WHERE guid = ?")
        .bind(now)
        .bind(event_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Recompute the denormalized unfinished-entry count and return it
pub async fn refresh_queue_count(conn: &mut SqliteConnection, event_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM queue_entries WHERE event_id = ? AND status != 'Archived'",
    )
    .bind(event_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE events SET queue_count = ? WHERE guid = ?")
        .bind(count)
        .bind(event_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(count)
}
