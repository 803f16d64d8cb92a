//! Organizations: multi-teacher billing entities

use lingo_common::db::models::{Organization, Teacher};
use lingo_common::{Error, Result};
use sqlx::SqlitePool;

use super::billing::BillingState;
use super::new_id;

const ORGANIZATION_COLUMNS: &str =
    "id, admin_id, plan, customer_id, subscription_id, expiration, canceled";

/// Create a FREE organization administered by `admin_user_id` and move the
/// admin's teacher record into it (creating the record if needed).
pub async fn create_organization(
    pool: &SqlitePool,
    admin_user_id: &str,
) -> Result<(Organization, Teacher)> {
    let organization_id = new_id();
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO organizations (id, admin_id, plan) VALUES (?, ?, 'FREE')")
        .bind(&organization_id)
        .bind(admin_user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO teachers (id, user_id, organization_id)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET organization_id = excluded.organization_id
        "#,
    )
    .bind(new_id())
    .bind(admin_user_id)
    .bind(&organization_id)
    .execute(&mut *tx)
    .await?;

    let organization = sqlx::query_as::<_, Organization>(&format!(
        "SELECT {} FROM organizations WHERE id = ?",
        ORGANIZATION_COLUMNS
    ))
    .bind(&organization_id)
    .fetch_one(&mut *tx)
    .await?;

    let teacher = sqlx::query_as::<_, Teacher>(
        "SELECT id, user_id, organization_id FROM teachers WHERE user_id = ?",
    )
    .bind(admin_user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((organization, teacher))
}

pub async fn get_organization(pool: &SqlitePool, id: &str) -> Result<Option<Organization>> {
    let organization = sqlx::query_as::<_, Organization>(&format!(
        "SELECT {} FROM organizations WHERE id = ?",
        ORGANIZATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(organization)
}

pub async fn get_organization_by_customer(
    pool: &SqlitePool,
    customer_id: &str,
) -> Result<Option<Organization>> {
    let organization = sqlx::query_as::<_, Organization>(&format!(
        "SELECT {} FROM organizations WHERE customer_id = ?",
        ORGANIZATION_COLUMNS
    ))
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(organization)
}

/// Overwrite the organization's billing state
pub async fn update_organization_billing(
    pool: &SqlitePool,
    organization_id: &str,
    state: &BillingState,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE organizations
        SET plan = ?,
            customer_id = NULLIF(?, ''),
            subscription_id = NULLIF(?, ''),
            expiration = ?,
            canceled = ?
        WHERE id = ?
        "#,
    )
    .bind(state.plan.as_str())
    .bind(&state.customer_id)
    .bind(&state.subscription_id)
    .bind(state.expiration)
    .bind(state.canceled)
    .bind(organization_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Organization {}", organization_id)));
    }

    Ok(())
}

/// Only the cancellation flag changes; plan and period are kept
pub async fn set_organization_canceled(
    pool: &SqlitePool,
    organization_id: &str,
    canceled: bool,
) -> Result<()> {
    let result = sqlx::query("UPDATE organizations SET canceled = ? WHERE id = ?")
        .bind(canceled)
        .bind(organization_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Organization {}", organization_id)));
    }

    Ok(())
}
