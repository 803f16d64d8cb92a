//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and bootstraps every table
//! the Lingo services read and write. All statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table on an already open pool.
///
/// Also used by tests against in-memory databases.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // Membership
    create_organizations_table(pool).await?;
    create_teachers_table(pool).await?;
    create_classrooms_table(pool).await?;
    create_students_table(pool).await?;

    // Billing
    create_billing_accounts_table(pool).await?;
    create_metered_usage_table(pool).await?;

    // Study material
    create_decks_table(pool).await?;
    create_flashcards_table(pool).await?;
    create_study_stats_table(pool).await?;

    // Learner
    create_profiles_table(pool).await?;
    create_daily_progress_table(pool).await?;

    // Generated content
    create_news_table(pool).await?;
    create_stories_table(pool).await?;
    create_audiobooks_table(pool).await?;
    create_accepted_content_table(pool).await?;
    create_generation_jobs_table(pool).await?;

    Ok(())
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            admin_id TEXT NOT NULL UNIQUE,
            plan TEXT NOT NULL DEFAULT 'FREE',
            customer_id TEXT UNIQUE,
            subscription_id TEXT,
            expiration DATE,
            canceled INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_teachers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teachers (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            organization_id TEXT REFERENCES organizations(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classrooms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classrooms (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
            name TEXT NOT NULL DEFAULT '',
            student_count INTEGER NOT NULL DEFAULT 0 CHECK (student_count >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_classrooms_teacher ON classrooms(teacher_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            classroom_id TEXT NOT NULL REFERENCES classrooms(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_billing_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS billing_accounts (
            user_id TEXT PRIMARY KEY,
            plan TEXT NOT NULL DEFAULT 'FREE',
            expiration DATE,
            canceled INTEGER NOT NULL DEFAULT 0,
            customer_id TEXT UNIQUE,
            subscription_id TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only usage ledger
async fn create_metered_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metered_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            feature_id TEXT NOT NULL,
            plan TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            period_end DATE NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_metered_usage_lookup
        ON metered_usage(user_id, feature_id, plan, period_end)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_decks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            is_system INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_flashcards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
            front_content TEXT NOT NULL,
            back_content TEXT NOT NULL,
            source_url TEXT,
            last_reviewed TIMESTAMP,
            review_count INTEGER NOT NULL DEFAULT 0,
            confidence_level INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_flashcards_deck ON flashcards(deck_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_study_stats_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS study_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
            cards_studied INTEGER NOT NULL DEFAULT 0,
            cards_mastered INTEGER NOT NULL DEFAULT 0,
            last_study_date TIMESTAMP NOT NULL,
            study_streak_days INTEGER NOT NULL DEFAULT 1,
            UNIQUE (user_id, deck_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            learning_language TEXT NOT NULL,
            skill_level TEXT NOT NULL,
            interested_topics TEXT NOT NULL DEFAULT '[]',
            daily_questions_goal INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_daily_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_progress (
            user_id TEXT NOT NULL,
            date DATE NOT NULL,
            questions_completed INTEGER NOT NULL DEFAULT 0,
            goal_met INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_news_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            language TEXT NOT NULL,
            topic TEXT NOT NULL,
            cefr_level TEXT NOT NULL,
            preview_text TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL,
            date_created DATE NOT NULL,
            UNIQUE (language, cefr_level, topic, date_created)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            language TEXT NOT NULL,
            topic TEXT NOT NULL,
            cefr_level TEXT NOT NULL,
            preview_text TEXT NOT NULL DEFAULT '',
            pages INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL,
            date_created DATE NOT NULL,
            UNIQUE (language, cefr_level, topic, date_created)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audiobooks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audiobooks (
            content_type TEXT NOT NULL CHECK (content_type IN ('News', 'Story')),
            content_id INTEGER NOT NULL,
            tier TEXT NOT NULL CHECK (tier IN ('BASIC', 'PREMIUM')),
            pages INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (content_type, content_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-classroom allowlist of news and stories
async fn create_accepted_content_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accepted_content (
            classroom_id TEXT NOT NULL REFERENCES classrooms(id) ON DELETE CASCADE,
            content_type TEXT NOT NULL CHECK (content_type IN ('News', 'Story')),
            content_id INTEGER NOT NULL,
            accepted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (classroom_id, content_type, content_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_generation_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generation_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            language TEXT NOT NULL,
            cefr_level TEXT NOT NULL,
            subject TEXT NOT NULL,
            content_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'running', 'done', 'failed')),
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_generation_jobs_status ON generation_jobs(status, id)")
        .execute(pool)
        .await?;

    Ok(())
}
