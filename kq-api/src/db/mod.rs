//! Database access layer
//!
//! Queries for events, queue entries, attendance, songs and settings.
//! Functions that take part in engine mutations accept a `&mut
//! SqliteConnection` so they can run inside the caller's transaction.

pub mod attendance;
pub mod events;
pub mod queue;
pub mod settings;
pub mod songs;

use crate::error::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

/// Open a transaction that takes the database write lock up front
///
/// A deferred `BEGIN` that reads and then writes fails with `SQLITE_BUSY`
/// when another connection commits in between; `IMMEDIATE` waits out the
/// busy timeout instead.
pub async fn begin_write(db: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(db.begin_with("BEGIN IMMEDIATE").await?)
}

/// Parse a TEXT guid column
pub(crate) fn parse_guid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Corrupt(format!("{} '{}' is not a UUID: {}", column, value, e)))
}

/// Parse a TEXT enum column
pub(crate) fn parse_text<T>(column: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = kq_common::Error>,
{
    value
        .parse()
        .map_err(|e| Error::Corrupt(format!("{}: {}", column, e)))
}
