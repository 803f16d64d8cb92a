//! Decks and flashcards
//!
//! Visibility is "owned by the caller or public". Write permissions are
//! decided by the handlers from the returned [`Deck`].

use chrono::Utc;
use lingo_common::db::models::{Deck, Flashcard};
use lingo_common::{Error, Result};
use sqlx::SqlitePool;

const DECK_COLUMNS: &str =
    "id, user_id, name, description, is_public, is_system, created_at, updated_at";

const FLASHCARD_COLUMNS: &str = "id, deck_id, front_content, back_content, source_url, \
     last_reviewed, review_count, confidence_level, created_at, updated_at";

/// Fields a client may change on a flashcard; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct FlashcardChanges {
    pub front_content: Option<String>,
    pub back_content: Option<String>,
    pub source_url: Option<String>,
    pub confidence_level: Option<i64>,
    /// Count a review now
    pub reviewed: bool,
}

/// The caller's own decks plus every public deck, system decks first
pub async fn list_decks(pool: &SqlitePool, user_id: &str) -> Result<Vec<Deck>> {
    let decks = sqlx::query_as::<_, Deck>(&format!(
        r#"
        SELECT {}
        FROM decks
        WHERE user_id = ? OR is_public = 1
        ORDER BY is_system DESC, created_at DESC, id DESC
        "#,
        DECK_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(decks)
}

/// A deck the caller may see; None when missing or private to someone else
pub async fn get_visible_deck(pool: &SqlitePool, deck_id: i64, user_id: &str) -> Result<Option<Deck>> {
    let deck = sqlx::query_as::<_, Deck>(&format!(
        "SELECT {} FROM decks WHERE id = ? AND (user_id = ? OR is_public = 1)",
        DECK_COLUMNS
    ))
    .bind(deck_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(deck)
}

pub async fn get_deck(pool: &SqlitePool, deck_id: i64) -> Result<Option<Deck>> {
    let deck = sqlx::query_as::<_, Deck>(&format!("SELECT {} FROM decks WHERE id = ?", DECK_COLUMNS))
        .bind(deck_id)
        .fetch_optional(pool)
        .await?;

    Ok(deck)
}

/// New private, non-system deck owned by `user_id`
pub async fn create_deck(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    description: &str,
) -> Result<Deck> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO decks (user_id, name, description, is_public, is_system, created_at, updated_at)
        VALUES (?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    get_deck(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Deck {} missing after insert", id)))
}

/// Delete a deck; its flashcards and study statistics go with it
pub async fn delete_deck(pool: &SqlitePool, deck_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM flashcards WHERE deck_id = ?")
        .bind(deck_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM study_stats WHERE deck_id = ?")
        .bind(deck_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM decks WHERE id = ?")
        .bind(deck_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Deck {}", deck_id)));
    }

    tx.commit().await?;
    Ok(())
}

// ========================================
// Flashcards
// ========================================

pub async fn flashcards_for_deck(pool: &SqlitePool, deck_id: i64) -> Result<Vec<Flashcard>> {
    let cards = sqlx::query_as::<_, Flashcard>(&format!(
        "SELECT {} FROM flashcards WHERE deck_id = ? ORDER BY id ASC",
        FLASHCARD_COLUMNS
    ))
    .bind(deck_id)
    .fetch_all(pool)
    .await?;

    Ok(cards)
}

pub async fn get_flashcard(pool: &SqlitePool, id: i64) -> Result<Option<Flashcard>> {
    let card = sqlx::query_as::<_, Flashcard>(&format!(
        "SELECT {} FROM flashcards WHERE id = ?",
        FLASHCARD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(card)
}

pub async fn create_flashcard(
    pool: &SqlitePool,
    deck_id: i64,
    front_content: &str,
    back_content: &str,
    source_url: Option<&str>,
) -> Result<Flashcard> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO flashcards (deck_id, front_content, back_content, source_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(deck_id)
    .bind(front_content)
    .bind(back_content)
    .bind(source_url)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE decks SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(deck_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let id = result.last_insert_rowid();
    get_flashcard(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Flashcard {} missing after insert", id)))
}

pub async fn update_flashcard(
    pool: &SqlitePool,
    id: i64,
    changes: &FlashcardChanges,
) -> Result<Flashcard> {
    let now = Utc::now();
    let last_reviewed = changes.reviewed.then_some(now);

    let result = sqlx::query(
        r#"
        UPDATE flashcards
        SET front_content = COALESCE(?, front_content),
            back_content = COALESCE(?, back_content),
            source_url = COALESCE(?, source_url),
            confidence_level = COALESCE(?, confidence_level),
            last_reviewed = COALESCE(?, last_reviewed),
            review_count = review_count + ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(changes.front_content.as_deref())
    .bind(changes.back_content.as_deref())
    .bind(changes.source_url.as_deref())
    .bind(changes.confidence_level)
    .bind(last_reviewed)
    .bind(i64::from(changes.reviewed))
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Flashcard {}", id)));
    }

    get_flashcard(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Flashcard {}", id)))
}

pub async fn delete_flashcard(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM flashcards WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Flashcard {}", id)));
    }

    Ok(())
}
