//! Tests for database initialization
//!
//! - Automatic database creation with the default schema
//! - Idempotent re-initialization of an existing database
//! - Settings table holds no tunables

use mrec_common::db::init::{init_database, init_memory_database};
use mrec_common::db::schema::USER_TABLES;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("mrec.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mrec.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_user_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in USER_TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table.name)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table.name);
    }
}

#[tokio::test]
async fn test_settings_table_starts_empty() {
    let pool = init_memory_database().await.unwrap();

    // Timing and TTL values come from the config file
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_missing_column_is_added_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mrec.db");

    // Simulate a database created before `meeting_id` existed on notes
    {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE notes (id TEXT PRIMARY KEY, user_id TEXT NOT NULL, \
             title TEXT NOT NULL DEFAULT '', content TEXT NOT NULL DEFAULT '', \
             created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let has_column: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info('notes') WHERE name = 'meeting_id')",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(has_column);
}
