//! Learner profiles
//!
//! One profile per user. Usernames are unique across all profiles.

use lingo_common::db::models::Profile;
use lingo_common::Result;
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::is_unique_violation;

/// Fields written by an upsert
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub username: String,
    pub learning_language: String,
    pub skill_level: String,
    pub interested_topics: Vec<String>,
    pub daily_questions_goal: i64,
}

/// Result of an upsert
#[derive(Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Row id of the created or updated profile
    Saved(i64),
    /// Another user holds the username
    UsernameTaken,
}

pub async fn get_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, user_id, username, learning_language, skill_level,
               interested_topics, daily_questions_goal
        FROM profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// Create the caller's profile or replace every field of it
pub async fn upsert_profile(
    pool: &SqlitePool,
    user_id: &str,
    fields: &ProfileFields,
) -> Result<UpsertOutcome> {
    let result = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO profiles (
            user_id, username, learning_language, skill_level,
            interested_topics, daily_questions_goal
        )
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            username = excluded.username,
            learning_language = excluded.learning_language,
            skill_level = excluded.skill_level,
            interested_topics = excluded.interested_topics,
            daily_questions_goal = excluded.daily_questions_goal
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&fields.username)
    .bind(&fields.learning_language)
    .bind(&fields.skill_level)
    .bind(Json(&fields.interested_topics))
    .bind(fields.daily_questions_goal)
    .fetch_one(pool)
    .await;

    match result {
        Ok(id) => Ok(UpsertOutcome::Saved(id)),
        Err(e) if is_unique_violation(&e) => Ok(UpsertOutcome::UsernameTaken),
        Err(e) => Err(e.into()),
    }
}

/// The caller's daily question goal; None without a profile
pub async fn daily_goal(pool: &SqlitePool, user_id: &str) -> Result<Option<i64>> {
    let goal = sqlx::query_scalar::<_, i64>(
        "SELECT daily_questions_goal FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(goal)
}
