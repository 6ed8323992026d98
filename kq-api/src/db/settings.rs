//! Settings database access
//!
//! Read/write runtime settings from the settings table (key-value store).
//! Every known key gets a default at database initialization; the typed
//! getters below fall back to the same defaults if a row has gone missing.

use crate::error::{Error, Result};
use kq_common::db::{Setting, DEFAULT_SETTINGS};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

pub const DEFAULT_REQUEST_LIMIT: &str = "default_request_limit";
pub const EVENT_BUS_CAPACITY: &str = "event_bus_capacity";
pub const SSE_KEEPALIVE_SECS: &str = "sse_keepalive_secs";
pub const DATABASE_BUSY_TIMEOUT_MS: &str = "database_busy_timeout_ms";

/// Request limit applied to new events that don't specify one
pub async fn get_default_request_limit(db: &Pool<Sqlite>) -> Result<i64> {
    get_positive(db, DEFAULT_REQUEST_LIMIT, 5).await
}

/// Capacity of the in-process broadcast bus
pub async fn get_event_bus_capacity(db: &Pool<Sqlite>) -> Result<usize> {
    Ok(get_positive(db, EVENT_BUS_CAPACITY, 1000).await? as usize)
}

/// Interval between SSE keep-alive comments
pub async fn get_sse_keepalive_secs(db: &Pool<Sqlite>) -> Result<u64> {
    Ok(get_positive(db, SSE_KEEPALIVE_SECS, 15).await? as u64)
}

/// SQLite busy timeout for pool connections
pub async fn get_busy_timeout_ms(db: &Pool<Sqlite>) -> Result<u64> {
    Ok(get_positive(db, DATABASE_BUSY_TIMEOUT_MS, 5000).await? as u64)
}

async fn get_positive(db: &Pool<Sqlite>, key: &str, default: i64) -> Result<i64> {
    match get_setting::<i64>(db, key).await? {
        Some(v) if v > 0 => Ok(v),
        Some(v) => {
            tracing::warn!("Setting '{}' has non-positive value {}, using {}", key, v, default);
            Ok(default)
        }
        None => Ok(default),
    }
}

/// Generic setting getter
///
/// Returns `None` if the key is absent or NULL.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// All settings ordered by key
pub async fn list_settings(db: &Pool<Sqlite>) -> Result<Vec<Setting>> {
    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT key, value FROM settings ORDER BY key ASC")
            .fetch_all(db)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(key, value)| Setting {
            key,
            value: value.unwrap_or_default(),
        })
        .collect())
}

/// Validate and store a setting supplied over the API
///
/// Only known keys are accepted and all of them are positive integers.
pub async fn update_known_setting(db: &Pool<Sqlite>, key: &str, value: &str) -> Result<Setting> {
    if !DEFAULT_SETTINGS.iter().any(|(k, _)| *k == key) {
        return Err(Error::NotFound(format!("Unknown setting: {}", key)));
    }

    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::BadRequest(format!("Setting '{}' must be an integer, got '{}'", key, value)))?;
    if parsed <= 0 {
        return Err(Error::BadRequest(format!(
            "Setting '{}' must be positive, got {}",
            key, parsed
        )));
    }

    set_setting(db, key, parsed).await?;
    tracing::info!("Setting '{}' updated to {}", key, parsed);

    Ok(Setting {
        key: key.to_string(),
        value: parsed.to_string(),
    })
}
