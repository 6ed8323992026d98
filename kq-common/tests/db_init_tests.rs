//! Tests for database initialization
//!
//! - Automatic database creation with default schema
//! - Reopening an existing database
//! - Default settings and schema invariants

use kq_common::db::init::{init_database, DEFAULT_SETTINGS};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("karaoke.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("karaoke.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("karaoke.db")).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count as usize, DEFAULT_SETTINGS.len());

    let limit: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'default_request_limit'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(limit.as_deref(), Some("5"));
}

#[tokio::test]
async fn test_existing_setting_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("karaoke.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '9' WHERE key = 'default_request_limit'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let limit: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'default_request_limit'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(limit.as_deref(), Some("9"));
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("karaoke.db")).await.unwrap();

    // Queue entry pointing at a missing event must be rejected
    let result = sqlx::query(
        r#"
        INSERT INTO queue_entries (guid, event_id, song_id, requestor, singers, position,
                                   status, created_at, updated_at)
        VALUES ('q1', 'missing-event', 'missing-song', 'alice', '["alice"]', 1,
                'Upcoming', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Foreign key violation should be rejected");
}
