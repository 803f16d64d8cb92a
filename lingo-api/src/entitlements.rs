//! Plan entitlements and metered consumption
//!
//! Teachers and students are billed through their organization. Everyone
//! else uses their individual billing account.

use chrono::{NaiveDate, Utc};
use lingo_common::plans::limit_for;
use lingo_common::{Entitlement, Feature, PlanTier};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{billing, organizations, usage};
use crate::roles::ResolvedRole;
use crate::{ApiError, ApiResult};

/// Plan in force for a caller and the expiration that bounds its period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanContext {
    pub plan: PlanTier,
    pub expiration: Option<NaiveDate>,
}

impl PlanContext {
    const FREE: PlanContext = PlanContext {
        plan: PlanTier::Free,
        expiration: None,
    };

    pub fn period_end(&self, today: NaiveDate) -> NaiveDate {
        usage::current_period_end(self.expiration, today)
    }
}

/// Organization a member is billed through: a teacher's own organization,
/// or for a student the organization of the classroom's teacher
async fn billing_organization_id(
    pool: &SqlitePool,
    role: &ResolvedRole,
) -> ApiResult<Option<String>> {
    if let Some(classroom_id) = role.classroom_id.as_deref() {
        let organization_id: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT t.organization_id
            FROM classrooms c
            JOIN teachers t ON t.id = c.teacher_id
            WHERE c.id = ?
            "#,
        )
        .bind(classroom_id)
        .fetch_optional(pool)
        .await?;
        return Ok(organization_id.flatten());
    }

    Ok(role.organization_id.clone())
}

pub async fn effective_plan(pool: &SqlitePool, role: &ResolvedRole) -> ApiResult<PlanContext> {
    if role.is_student() || role.is_teacher() {
        let Some(organization_id) = billing_organization_id(pool, role).await? else {
            return Ok(PlanContext::FREE);
        };
        return match organizations::get_organization(pool, &organization_id).await? {
            Some(organization) => Ok(PlanContext {
                plan: organization.plan_tier()?,
                expiration: organization.expiration,
            }),
            None => Ok(PlanContext::FREE),
        };
    }

    let account = billing::get_billing_account(pool, &role.user_id).await?;
    Ok(PlanContext {
        plan: account.plan_tier()?,
        expiration: account.expiration,
    })
}

/// Record `amount` of `feature` for the caller, or fail with the usage
/// error the plan dictates. Nothing is recorded on failure.
pub async fn consume(
    pool: &SqlitePool,
    role: &ResolvedRole,
    feature: Feature,
    amount: i64,
) -> ApiResult<()> {
    let context = effective_plan(pool, role).await?;
    let limit = limit_for(feature, context.plan);
    let period_end = context.period_end(Utc::now().date_naive());

    // The ledger count is checked by the insert below; this rejects plans
    // that could never allow `amount`
    let entitlement = Entitlement::evaluate(limit, 0, amount);
    if !entitlement.is_permitted() {
        return Err(match entitlement {
            Entitlement::Restricted => ApiError::UsageRestricted(feature),
            _ => ApiError::UsageLimitReached(feature),
        });
    }

    let recorded = usage::record_usage_within_limit(
        pool,
        &role.user_id,
        feature,
        context.plan,
        period_end,
        amount,
        limit,
    )
    .await?;

    if !recorded {
        info!(
            user_id = %role.user_id,
            %feature,
            plan = %context.plan,
            limit,
            "Usage limit reached"
        );
        return Err(ApiError::UsageLimitReached(feature));
    }

    debug!(user_id = %role.user_id, %feature, amount, %period_end, "Usage recorded");
    Ok(())
}

/// Usage against allowance for one feature; `max` is -1 when unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureUsage {
    pub usage: i64,
    pub max: i64,
}

/// Current-period usage of every metered feature under `plan`
pub async fn usage_summary(
    pool: &SqlitePool,
    user_id: &str,
    plan: PlanTier,
    period_end: NaiveDate,
) -> ApiResult<Vec<(Feature, FeatureUsage)>> {
    let mut summary = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL {
        let used = usage::usage(pool, user_id, feature, plan, period_end).await?;
        summary.push((
            feature,
            FeatureUsage {
                usage: used,
                max: limit_for(feature, plan),
            },
        ));
    }
    Ok(summary)
}
