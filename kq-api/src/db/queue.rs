//! Queue entry database operations
//!
//! Row-level CRUD for `queue_entries`. Ordering rules live in
//! `crate::queue`; this module only writes what it is told.

use super::{parse_guid, parse_text};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use kq_common::db::QueueEntry;
use sqlx::SqliteConnection;
use uuid::Uuid;

const ENTRY_COLUMNS: &str = r#"
    guid, event_id, song_id, requestor, singers, position, status,
    is_active, was_skipped, is_current, is_on_break, sung_at,
    created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct QueueEntryRow {
    guid: String,
    event_id: String,
    song_id: String,
    requestor: String,
    singers: String,
    position: Option<i64>,
    status: String,
    is_active: bool,
    was_skipped: bool,
    is_current: bool,
    is_on_break: bool,
    sung_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = Error;

    fn try_from(row: QueueEntryRow) -> Result<Self> {
        let singers: Vec<String> = serde_json::from_str(&row.singers).map_err(|e| {
            Error::Corrupt(format!("queue_entries.singers for {}: {}", row.guid, e))
        })?;

        Ok(QueueEntry {
            id: parse_guid("queue_entries.guid", &row.guid)?,
            event_id: parse_guid("queue_entries.event_id", &row.event_id)?,
            song_id: parse_guid("queue_entries.song_id", &row.song_id)?,
            requestor: row.requestor,
            singers,
            position: row.position,
            status: parse_text("queue_entries.status", &row.status)?,
            is_active: row.is_active,
            was_skipped: row.was_skipped,
            is_current: row.is_current,
            is_on_break: row.is_on_break,
            sung_at: row.sung_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect(rows: Vec<QueueEntryRow>) -> Result<Vec<QueueEntry>> {
    rows.into_iter().map(QueueEntry::try_from).collect()
}

pub async fn insert_entry(conn: &mut SqliteConnection, entry: &QueueEntry) -> Result<()> {
    let singers = serde_json::to_string(&entry.singers)
        .map_err(|e| Error::Internal(format!("Failed to encode singers: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO queue_entries (
            guid, event_id, song_id, requestor, singers, position, status,
            is_active, was_skipped, is_current, is_on_break, sung_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.event_id.to_string())
    .bind(entry.song_id.to_string())
    .bind(&entry.requestor)
    .bind(singers)
    .bind(entry.position)
    .bind(entry.status.as_str())
    .bind(entry.is_active)
    .bind(entry.was_skipped)
    .bind(entry.is_current)
    .bind(entry.is_on_break)
    .bind(entry.sung_at)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Get a single queue entry by ID
pub async fn get_entry(conn: &mut SqliteConnection, entry_id: Uuid) -> Result<QueueEntry> {
    let sql = format!("SELECT {} FROM queue_entries WHERE guid = ?", ENTRY_COLUMNS);
    let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
        .bind(entry_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Queue entry not found: {}", entry_id)))?;

    QueueEntry::try_from(row)
}

/// Unfinished entries of an event ordered by position
pub async fn list_unfinished(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<QueueEntry>> {
    let sql = format!(
        r#"
        SELECT {} FROM queue_entries
        WHERE event_id = ? AND status != 'Archived'
        ORDER BY position ASC
        "#,
        ENTRY_COLUMNS
    );
    let rows = sqlx::query_as::<_, QueueEntryRow>(&sql)
        .bind(event_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    collect(rows)
}

/// Archived entries of an event, most recent first
pub async fn list_archived(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Vec<QueueEntry>> {
    let sql = format!(
        r#"
        SELECT {} FROM queue_entries
        WHERE event_id = ? AND status = 'Archived'
        ORDER BY COALESCE(sung_at, updated_at) DESC
        "#,
        ENTRY_COLUMNS
    );
    let rows = sqlx::query_as::<_, QueueEntryRow>(&sql)
        .bind(event_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    collect(rows)
}

pub async fn get_current(conn: &mut SqliteConnection, event_id: Uuid) -> Result<Option<QueueEntry>> {
    let sql = format!(
        "SELECT {} FROM queue_entries WHERE event_id = ? AND is_current = 1",
        ENTRY_COLUMNS
    );
    let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
        .bind(event_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(QueueEntry::try_from).transpose()
}

pub async fn count_unfinished(conn: &mut SqliteConnection, event_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM queue_entries WHERE event_id = ? AND status != 'Archived'",
    )
    .bind(event_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

pub async fn count_unfinished_for_requestor(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    requestor: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM queue_entries
        WHERE event_id = ? AND requestor = ? AND status != 'Archived'
        "#,
    )
    .bind(event_id.to_string())
    .bind(requestor)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Assign positions `1..=n` following `ordered_ids`
///
/// `ordered_ids` must cover every unfinished entry of the event. Positions
/// are first parked at their negatives so the unique position index never
/// sees two rows on the same slot mid-rewrite.
pub async fn write_positions(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    ordered_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE queue_entries SET position = -position
        WHERE event_id = ? AND position IS NOT NULL
        "#,
    )
    .bind(event_id.to_string())
    .execute(&mut *conn)
    .await?;

    for (index, entry_id) in ordered_ids.iter().enumerate() {
        let position = index as i64 + 1;
        let result = sqlx::query(
            r#"
            UPDATE queue_entries
            SET position = ?,
                updated_at = CASE WHEN position = -? THEN updated_at ELSE ? END
            WHERE guid = ? AND event_id = ?
            "#,
        )
        .bind(position)
        .bind(position)
        .bind(now)
        .bind(entry_id.to_string())
        .bind(event_id.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Queue entry not found: {}", entry_id)));
        }
    }

    Ok(())
}

/// Move an entry out of the queue
///
/// Clears its position and current flag. `sung_at` is set for performances,
/// `was_skipped` for skips.
pub async fn archive_entry(
    conn: &mut SqliteConnection,
    entry_id: Uuid,
    was_skipped: bool,
    sung_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE queue_entries
        SET status = 'Archived', position = NULL, is_current = 0,
            was_skipped = ?, sung_at = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(was_skipped)
    .bind(sung_at)
    .bind(now)
    .bind(entry_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Archive every unfinished entry of an event without marking them sung
pub async fn archive_all_unfinished(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE queue_entries
        SET status = 'Archived', position = NULL, is_current = 0, updated_at = ?
        WHERE event_id = ? AND status != 'Archived'
        "#,
    )
    .bind(now)
    .bind(event_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_entry(conn: &mut SqliteConnection, entry_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM queue_entries WHERE guid = ?")
        .bind(entry_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Queue entry not found: {}", entry_id)));
    }
    Ok(())
}

/// Put an entry on stage
pub async fn set_current(conn: &mut SqliteConnection, entry_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE queue_entries SET status = 'Live', is_current = 1, updated_at = ? WHERE guid = ?",
    )
    .bind(now)
    .bind(entry_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Take an entry off stage without finishing it
pub async fn demote_current(conn: &mut SqliteConnection, entry_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE queue_entries SET status = 'Upcoming', is_current = 0, updated_at = ? WHERE guid = ?",
    )
    .bind(now)
    .bind(entry_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Mirror a singer's attendance onto their unfinished entries
///
/// Returns the number of entries whose flags actually changed.
pub async fn sync_requestor_flags(
    conn: &mut SqliteConnection,
    event_id: Uuid,
    requestor: &str,
    is_active: bool,
    is_on_break: bool,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE queue_entries
        SET is_active = ?, is_on_break = ?, updated_at = ?
        WHERE event_id = ? AND requestor = ? AND status != 'Archived'
          AND (is_active != ? OR is_on_break != ?)
        "#,
    )
    .bind(is_active)
    .bind(is_on_break)
    .bind(now)
    .bind(event_id.to_string())
    .bind(requestor)
    .bind(is_active)
    .bind(is_on_break)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
