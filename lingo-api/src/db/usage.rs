//! Metered usage ledger
//!
//! Consumption is appended per (user, feature, plan, period end) and summed
//! on read. Rows are never updated or deleted.
//!
//! Every caller derives the period boundary from [`current_period_end`], so
//! reads and writes always agree on which period a row belongs to.

use chrono::{Datelike, Months, NaiveDate};
use lingo_common::plans::UNLIMITED;
use lingo_common::retry::retry_on_lock;
use lingo_common::{Error, Feature, PlanTier, Result};
use sqlx::SqlitePool;

/// Total time to keep retrying a locked ledger write
const LEDGER_LOCK_WAIT_MS: u64 = 2000;

/// End of the billing period containing `today`.
///
/// A paid account's period ends at its expiration date; an account without
/// one is metered per calendar month.
pub fn current_period_end(expiration: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    if let Some(expiration) = expiration {
        return expiration;
    }

    let first_of_month = today.with_day(1).unwrap_or(today);
    first_of_month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(today)
}

/// Sum of recorded amounts for exactly this period end (0 when none)
pub async fn usage(
    pool: &SqlitePool,
    user_id: &str,
    feature: Feature,
    plan: PlanTier,
    period_end: NaiveDate,
) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM metered_usage
        WHERE user_id = ? AND feature_id = ? AND plan = ? AND period_end = ?
        "#,
    )
    .bind(user_id)
    .bind(feature.id())
    .bind(plan.as_str())
    .bind(period_end)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Append a usage row unconditionally
pub async fn record_usage(
    pool: &SqlitePool,
    user_id: &str,
    feature: Feature,
    plan: PlanTier,
    period_end: NaiveDate,
    amount: i64,
) -> Result<()> {
    validate_amount(amount)?;

    retry_on_lock("record usage", LEDGER_LOCK_WAIT_MS, move || async move {
        sqlx::query(
            r#"
            INSERT INTO metered_usage (user_id, feature_id, plan, amount, period_end)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(feature.id())
        .bind(plan.as_str())
        .bind(amount)
        .bind(period_end)
        .execute(pool)
        .await?;
        Ok::<_, Error>(())
    })
    .await
}

/// Append a usage row only if the period total stays within `limit`.
///
/// The limit check and the insert are one statement, so concurrent callers
/// cannot both pass the check. Returns whether the row was recorded.
/// An [`UNLIMITED`] limit always records.
pub async fn record_usage_within_limit(
    pool: &SqlitePool,
    user_id: &str,
    feature: Feature,
    plan: PlanTier,
    period_end: NaiveDate,
    amount: i64,
    limit: i64,
) -> Result<bool> {
    validate_amount(amount)?;

    if limit == UNLIMITED {
        record_usage(pool, user_id, feature, plan, period_end, amount).await?;
        return Ok(true);
    }

    retry_on_lock("record usage within limit", LEDGER_LOCK_WAIT_MS, move || async move {
        let result = sqlx::query(
            r#"
            INSERT INTO metered_usage (user_id, feature_id, plan, amount, period_end)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE (
                SELECT COALESCE(SUM(amount), 0)
                FROM metered_usage
                WHERE user_id = ?1 AND feature_id = ?2 AND plan = ?3 AND period_end = ?5
            ) + ?4 <= ?6
            "#,
        )
        .bind(user_id)
        .bind(feature.id())
        .bind(plan.as_str())
        .bind(amount)
        .bind(period_end)
        .bind(limit)
        .execute(pool)
        .await?;

        Ok::<_, Error>(result.rows_affected() == 1)
    })
    .await
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidInput(format!(
            "Usage amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
