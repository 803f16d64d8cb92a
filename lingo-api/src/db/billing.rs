//! Individual billing accounts
//!
//! Accounts are created lazily: the first read for a user inserts a FREE
//! account with no expiration.

use chrono::NaiveDate;
use lingo_common::db::models::BillingAccount;
use lingo_common::{Error, PlanTier, Result};
use sqlx::SqlitePool;

/// Plan and payment-provider state written by checkout and webhooks.
///
/// Empty provider ids are stored as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingState {
    pub plan: PlanTier,
    pub customer_id: String,
    pub subscription_id: String,
    pub expiration: Option<NaiveDate>,
    pub canceled: bool,
}

impl BillingState {
    /// The FREE state after a failed payment or deleted subscription.
    /// The customer id is kept so later events still match the account.
    pub fn downgraded(customer_id: &str) -> Self {
        Self {
            plan: PlanTier::Free,
            customer_id: customer_id.to_string(),
            subscription_id: String::new(),
            expiration: None,
            canceled: false,
        }
    }
}

/// Fetch the user's billing account, creating a FREE one on first access
pub async fn get_billing_account(pool: &SqlitePool, user_id: &str) -> Result<BillingAccount> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO billing_accounts (user_id, plan, expiration, canceled)
        VALUES (?, 'FREE', NULL, 0)
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    let account = sqlx::query_as::<_, BillingAccount>(
        r#"
        SELECT user_id, plan, expiration, canceled, customer_id, subscription_id
        FROM billing_accounts
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

/// Overwrite the account's billing state. The account must already exist.
pub async fn update_billing_account(
    pool: &SqlitePool,
    user_id: &str,
    state: &BillingState,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE billing_accounts
        SET plan = ?,
            customer_id = NULLIF(?, ''),
            subscription_id = NULLIF(?, ''),
            expiration = ?,
            canceled = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE user_id = ?
        "#,
    )
    .bind(state.plan.as_str())
    .bind(&state.customer_id)
    .bind(&state.subscription_id)
    .bind(state.expiration)
    .bind(state.canceled)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Billing account for {}", user_id)));
    }

    Ok(())
}

/// Only the cancellation flag changes; plan and period are kept
pub async fn set_billing_canceled(pool: &SqlitePool, user_id: &str, canceled: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE billing_accounts SET canceled = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?",
    )
    .bind(canceled)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Billing account for {}", user_id)));
    }

    Ok(())
}

pub async fn user_id_by_customer(pool: &SqlitePool, customer_id: &str) -> Result<Option<String>> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM billing_accounts WHERE customer_id = ?")
            .bind(customer_id)
            .fetch_optional(pool)
            .await?;

    Ok(user_id)
}
