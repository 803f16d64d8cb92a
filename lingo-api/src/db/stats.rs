//! Per-deck study statistics

use chrono::{DateTime, Utc};
use lingo_common::db::models::StudyStats;
use lingo_common::Result;
use sqlx::SqlitePool;

/// One finished study session
#[derive(Debug, Clone)]
pub struct StudySession {
    pub deck_id: i64,
    pub cards_studied: i64,
    pub cards_mastered: i64,
    pub study_date: DateTime<Utc>,
}

/// All of the caller's deck statistics, most recently studied first
pub async fn list_stats(pool: &SqlitePool, user_id: &str) -> Result<Vec<StudyStats>> {
    let stats = sqlx::query_as::<_, StudyStats>(
        r#"
        SELECT ss.id, ss.user_id, ss.deck_id, d.name AS deck_name,
               ss.cards_studied, ss.cards_mastered, ss.last_study_date,
               ss.study_streak_days
        FROM study_stats ss
        JOIN decks d ON ss.deck_id = d.id
        WHERE ss.user_id = ?
        ORDER BY ss.last_study_date DESC, ss.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(stats)
}

/// Streak after a session on `studied`, given the previous last study time
///
/// Same day keeps the streak, the next day extends it, a gap restarts it.
/// A session older than the last one leaves it alone.
pub fn next_streak(last: DateTime<Utc>, streak: i64, studied: DateTime<Utc>) -> i64 {
    match (studied.date_naive() - last.date_naive()).num_days() {
        1 => streak.saturating_add(1),
        d if d <= 0 => streak,
        _ => 1,
    }
}

/// Add a session to the caller's totals for its deck
pub async fn record_session(pool: &SqlitePool, user_id: &str, session: &StudySession) -> Result<()> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, (DateTime<Utc>, i64)>(
        "SELECT last_study_date, study_streak_days FROM study_stats WHERE user_id = ? AND deck_id = ?",
    )
    .bind(user_id)
    .bind(session.deck_id)
    .fetch_optional(&mut *tx)
    .await?;

    match existing {
        Some((last, streak)) => {
            sqlx::query(
                r#"
                UPDATE study_stats
                SET cards_studied = cards_studied + ?,
                    cards_mastered = cards_mastered + ?,
                    last_study_date = ?,
                    study_streak_days = ?
                WHERE user_id = ? AND deck_id = ?
                "#,
            )
            .bind(session.cards_studied)
            .bind(session.cards_mastered)
            .bind(last.max(session.study_date))
            .bind(next_streak(last, streak, session.study_date))
            .bind(user_id)
            .bind(session.deck_id)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO study_stats
                    (user_id, deck_id, cards_studied, cards_mastered, last_study_date, study_streak_days)
                VALUES (?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(user_id)
            .bind(session.deck_id)
            .bind(session.cards_studied)
            .bind(session.cards_mastered)
            .bind(session.study_date)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}
