//! Attendance and attendance-history queries

use super::{parse_guid, parse_text};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use kq_common::db::{Attendance, AttendanceAction, AttendanceHistory};
use sqlx::SqliteConnection;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    guid: String,
    event_id: String,
    singer: String,
    is_checked_in: bool,
    is_on_break: bool,
    break_start_at: Option<DateTime<Utc>>,
    break_end_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = Error;

    fn try_from(row: AttendanceRow) -> Result<Self> {
        Ok(Attendance {
            id: parse_guid("event_attendance.guid", &row.guid)?,
            event_id: parse_guid("event_attendance.event_id", &row.event_id)?,
            singer: row.singer,
            is_checked_in: row.is_checked_in,
            is_on_break: row.is_on_break,
            break_start_at: row.break_start_at,
            break_end_at: row.break_end_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    guid: String,
    event_id: String,
    singer: String,
    attendance_id: String,
    action: String,
    action_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for AttendanceHistory {
    type Error = Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(AttendanceHistory {
            id: parse_guid("event_attendance_history.guid", &row.guid)?,
            event_id: parse_guid("event_attendance_history.event_id", &row.event_id)?,
            singer: row.singer,
            attendance_id: parse_guid("event_attendance_history.attendance_id", &row.attendance_id)?,
            action: parse_text("event_attendance_history.action", &row.action)?,
            action_at: row.action_at,
        })
    }
}

pub async fn find_attendance(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    singer: &str,
) -> Result<Option<Attendance>> {
    let row = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT guid, event_id, singer, is_checked_in, is_on_break,
               break_start_at, break_end_at, updated_at
        FROM event_attendance
        WHERE event_id = ? AND singer = ?
        "#,
    )
    .bind(event_id.to_string())
    .bind(singer)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Attendance::try_from).transpose()
}

pub async fn list_attendance(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<Attendance>> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT guid, event_id, singer, is_checked_in, is_on_break,
               break_start_at, break_end_at, updated_at
        FROM event_attendance
        WHERE event_id = ?
        ORDER BY singer ASC
        "#,
    )
    .bind(event_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Attendance::try_from).collect()
}

/// Singers currently checked in to an event
pub async fn list_checked_in(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<Attendance>> {
    Ok(list_attendance(conn, event_id)
        .await?
        .into_iter()
        .filter(|a| a.is_checked_in)
        .collect())
}

/// Insert or update the (event, singer) row and return the stored record
///
/// The guid of an existing row is preserved.
pub async fn upsert_attendance(conn: &mut SqliteConnection, attendance: &Attendance) -> Result<Attendance> {
    sqlx::query(
        r#"
        INSERT INTO event_attendance (
            guid, event_id, singer, is_checked_in, is_on_break,
            break_start_at, break_end_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_id, singer) DO UPDATE SET
            is_checked_in = excluded.is_checked_in,
            is_on_break = excluded.is_on_break,
            break_start_at = excluded.break_start_at,
            break_end_at = excluded.break_end_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(attendance.id.to_string())
    .bind(attendance.event_id.to_string())
    .bind(&attendance.singer)
    .bind(attendance.is_checked_in)
    .bind(attendance.is_on_break)
    .bind(attendance.break_start_at)
    .bind(attendance.break_end_at)
    .bind(attendance.updated_at)
    .execute(&mut *conn)
    .await?;

    find_attendance(conn, attendance.event_id, &attendance.singer)
        .await?
        .ok_or_else(|| Error::Internal(format!("Attendance for {} vanished after upsert", attendance.singer)))
}

/// Append one history row
pub async fn record_history(
    conn: &mut SqliteConnection,
    attendance: &Attendance,
    action: AttendanceAction,
    action_at: DateTime<Utc>,
) -> Result<AttendanceHistory> {
    let entry = AttendanceHistory {
        id: Uuid::new_v4(),
        event_id: attendance.event_id,
        singer: attendance.singer.clone(),
        attendance_id: attendance.id,
        action,
        action_at,
    };

    sqlx::query(
        r#"
        INSERT INTO event_attendance_history (guid, event_id, singer, attendance_id, action, action_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.event_id.to_string())
    .bind(&entry.singer)
    .bind(entry.attendance_id.to_string())
    .bind(entry.action.as_str())
    .bind(entry.action_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Chronological history of an event, optionally for one singer
pub async fn list_history(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    singer: Option<&str>,
) -> Result<Vec<AttendanceHistory>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT guid, event_id, singer, attendance_id, action, action_at
        FROM event_attendance_history
        WHERE event_id = ? AND (? IS NULL OR singer = ?)
        ORDER BY action_at ASC, rowid ASC
        "#,
    )
    .bind(event_id.to_string())
    .bind(singer)
    .bind(singer)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(AttendanceHistory::try_from).collect()
}
