//! Tests for database initialization
//!
//! Covers automatic creation, idempotent re-open, and schema constraints
//! the services rely on.

use lingo_common::db::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("lingo.db");

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lingo.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("lingo.db")).await.unwrap();

    for table in [
        "organizations",
        "teachers",
        "classrooms",
        "students",
        "billing_accounts",
        "metered_usage",
        "decks",
        "flashcards",
        "study_stats",
        "profiles",
        "daily_progress",
        "news",
        "stories",
        "audiobooks",
        "accepted_content",
        "generation_jobs",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_accepted_content_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("lingo.db")).await.unwrap();

    sqlx::query("INSERT INTO teachers (id, user_id) VALUES ('t1', 'u1')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO classrooms (id, teacher_id) VALUES ('c1', 't1')")
        .execute(&pool)
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO accepted_content (classroom_id, content_type, content_id) VALUES ('c1', 'Podcast', 1)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_one_student_record_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("lingo.db")).await.unwrap();

    sqlx::query("INSERT INTO teachers (id, user_id) VALUES ('t1', 'teacher')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO classrooms (id, teacher_id) VALUES ('c1', 't1'), ('c2', 't1')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO students (id, user_id, classroom_id) VALUES ('s1', 'pupil', 'c1')")
        .execute(&pool)
        .await
        .unwrap();

    let second =
        sqlx::query("INSERT INTO students (id, user_id, classroom_id) VALUES ('s2', 'pupil', 'c2')")
            .execute(&pool)
            .await;

    assert!(second.is_err());
}
