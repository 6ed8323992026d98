//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, builds the
//! schema idempotently and writes default settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version, recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Busy timeout used before the settings table can be read
pub const BOOTSTRAP_BUSY_TIMEOUT_MS: u64 = 5000;

/// Runtime settings and their defaults
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("default_request_limit", "5"),
    ("event_bus_capacity", "1000"),
    ("sse_keepalive_secs", "15"),
    ("database_busy_timeout_ms", "5000"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with_busy_timeout(db_path, Duration::from_millis(BOOTSTRAP_BUSY_TIMEOUT_MS)).await
}

/// Same as [`init_database`] with an explicit per-connection busy timeout
pub async fn init_database_with_busy_timeout(db_path: &Path, busy_timeout: Duration) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys and busy timeout are per-connection, so they go on the
    // connect options rather than a one-off PRAGMA against the pool
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to a single connection: every SQLite in-memory connection is its
/// own database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables, indexes and default settings (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_events_table(pool).await?;
    create_songs_table(pool).await?;
    create_queue_entries_table(pool).await?;
    create_attendance_tables(pool).await?;

    record_schema_version(pool).await?;
    init_default_settings(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;

    match current {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await?;
            info!("Schema version set to {}", SCHEMA_VERSION);
        }
        Some(v) if v > SCHEMA_VERSION => {
            warn!(
                "Database schema version {} is newer than this build ({})",
                v, SCHEMA_VERSION
            );
        }
        Some(_) => {}
    }

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            guid TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL CHECK (status IN ('Upcoming', 'Live', 'Archived')),
            visibility TEXT NOT NULL CHECK (visibility IN ('Visible', 'Hidden')),
            location TEXT NOT NULL DEFAULT '',
            scheduled_date DATE NOT NULL,
            scheduled_start_time TIME,
            scheduled_end_time TIME,
            dj_name TEXT,
            is_canceled INTEGER NOT NULL DEFAULT 0,
            request_limit INTEGER NOT NULL CHECK (request_limit > 0),
            queue_count INTEGER NOT NULL DEFAULT 0 CHECK (queue_count >= 0),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_schedule ON events(scheduled_date, scheduled_start_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            genre TEXT,
            bpm REAL CHECK (bpm IS NULL OR bpm > 0),
            energy REAL CHECK (energy IS NULL OR (energy >= 0 AND energy <= 1)),
            valence REAL CHECK (valence IS NULL OR (valence >= 0 AND valence <= 1)),
            danceability REAL CHECK (danceability IS NULL OR (danceability >= 0 AND danceability <= 1)),
            popularity INTEGER CHECK (popularity IS NULL OR (popularity >= 0 AND popularity <= 100)),
            status TEXT NOT NULL CHECK (status IN ('Pending', 'Active', 'Declined')),
            requested_by TEXT,
            approved_by TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(title)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the queue table
///
/// Positions are dense per event among unfinished entries; archived entries
/// carry NULL. Both invariants are backed by partial unique indexes.
async fn create_queue_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            guid TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(guid) ON DELETE CASCADE,
            song_id TEXT NOT NULL REFERENCES songs(guid),
            requestor TEXT NOT NULL,
            singers TEXT NOT NULL,
            position INTEGER,
            status TEXT NOT NULL CHECK (status IN ('Upcoming', 'Live', 'Archived')),
            is_active INTEGER NOT NULL DEFAULT 0,
            was_skipped INTEGER NOT NULL DEFAULT 0,
            is_current INTEGER NOT NULL DEFAULT 0,
            is_on_break INTEGER NOT NULL DEFAULT 0,
            sung_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            CHECK ((status = 'Archived') = (position IS NULL)),
            CHECK (is_current = 0 OR status = 'Live')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_entries_position
        ON queue_entries(event_id, position) WHERE position IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_entries_current
        ON queue_entries(event_id) WHERE is_current = 1
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_entries_requestor ON queue_entries(event_id, requestor)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_attendance (
            guid TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(guid) ON DELETE CASCADE,
            singer TEXT NOT NULL,
            is_checked_in INTEGER NOT NULL DEFAULT 0,
            is_on_break INTEGER NOT NULL DEFAULT 0,
            break_start_at TIMESTAMP,
            break_end_at TIMESTAMP,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (event_id, singer),
            CHECK (is_on_break = 0 OR is_checked_in = 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_attendance_history (
            guid TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(guid) ON DELETE CASCADE,
            singer TEXT NOT NULL,
            attendance_id TEXT NOT NULL REFERENCES event_attendance(guid) ON DELETE CASCADE,
            action TEXT NOT NULL CHECK (action IN ('CheckIn', 'CheckOut', 'BreakStart', 'BreakEnd')),
            action_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_history_event ON event_attendance_history(event_id, action_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// This function ensures all required settings exist with default values.
/// It also handles NULL values by resetting them to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE: concurrent initializers may race past the lookup
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;

            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
