//! Daily question progress and goal streaks
//!
//! Days are UTC calendar dates chosen by the caller, so handlers pass
//! `Utc::now().date_naive()` and tests pass fixed dates.

use chrono::{Duration, NaiveDate};
use lingo_common::db::models::DailyProgress;
use lingo_common::Result;
use sqlx::SqlitePool;

/// Consecutive goal days ending today or yesterday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub days: i64,
    /// The run includes today
    pub completed_today: bool,
}

/// The caller's progress row for `today`, created empty if missing
pub async fn today_progress(pool: &SqlitePool, user_id: &str, today: NaiveDate) -> Result<DailyProgress> {
    sqlx::query(
        r#"
        INSERT INTO daily_progress (user_id, date)
        VALUES (?, ?)
        ON CONFLICT (user_id, date) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(today)
    .execute(pool)
    .await?;

    let progress = sqlx::query_as::<_, DailyProgress>(
        "SELECT user_id, date, questions_completed, goal_met FROM daily_progress WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

/// Add `amount` answered questions to today and re-evaluate the goal
pub async fn increment(
    pool: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
    amount: u32,
    daily_goal: i64,
) -> Result<DailyProgress> {
    let progress = sqlx::query_as::<_, DailyProgress>(
        r#"
        INSERT INTO daily_progress (user_id, date, questions_completed, goal_met)
        VALUES (?1, ?2, ?3, ?3 >= ?4)
        ON CONFLICT (user_id, date) DO UPDATE SET
            questions_completed = daily_progress.questions_completed + ?3,
            goal_met = (daily_progress.questions_completed + ?3) >= ?4
        RETURNING user_id, date, questions_completed, goal_met
        "#,
    )
    .bind(user_id)
    .bind(today)
    .bind(i64::from(amount))
    .bind(daily_goal)
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

/// Current goal streak as of `today`
pub async fn streak(pool: &SqlitePool, user_id: &str, today: NaiveDate) -> Result<Streak> {
    let days = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT date FROM daily_progress
        WHERE user_id = ? AND goal_met = 1 AND date <= ?
        ORDER BY date DESC
        "#,
    )
    .bind(user_id)
    .bind(today)
    .fetch_all(pool)
    .await?;

    Ok(current_streak(&days, today))
}

/// Length of the run of consecutive days at the head of `goal_days`
/// (newest first), counted only when it reaches today or yesterday.
pub fn current_streak(goal_days: &[NaiveDate], today: NaiveDate) -> Streak {
    let none = Streak { days: 0, completed_today: false };
    let Some(&latest) = goal_days.first() else {
        return none;
    };

    let completed_today = latest == today;
    if !completed_today && latest != today - Duration::days(1) {
        return none;
    }

    let mut expected = latest;
    let mut days = 0;
    for &day in goal_days {
        if day != expected {
            break;
        }
        days += 1;
        expected = day - Duration::days(1);
    }

    Streak { days, completed_today }
}
