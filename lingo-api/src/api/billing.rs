//! Individual billing endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use lingo_common::PlanTier;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::db::billing;
use crate::entitlements::{effective_plan, usage_summary, FeatureUsage};
use crate::roles::Caller;
use crate::services::CheckoutRequest;
use crate::{ApiError, ApiResult, AppState};

/// Trial length offered on individual checkouts
const TRIAL_PERIOD_DAYS: u32 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    pub plan: Option<String>,
}

/// Flatten a usage summary into `<feature>_usage` / `max_<feature>_usage`
fn usage_body(summary: &[(lingo_common::Feature, FeatureUsage)]) -> Value {
    let mut body = Map::new();
    for (feature, usage) in summary {
        body.insert(format!("{}_usage", feature.id()), json!(usage.usage));
        body.insert(format!("max_{}_usage", feature.id()), json!(usage.max));
    }
    Value::Object(body)
}

/// GET /billing
pub async fn get_billing(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Value>> {
    let account = billing::get_billing_account(&state.db, &caller.user_id).await?;

    Ok(Json(json!({
        "plan": account.plan,
        "expiration": account.expiration,
        "canceled": account.canceled,
    })))
}

/// GET /billing/usage
pub async fn get_usage(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<Value>> {
    let context = effective_plan(&state.db, &caller).await?;
    let plan = match query.plan.as_deref().map(str::trim) {
        None | Some("") => context.plan,
        Some(value) => value.parse::<PlanTier>()?,
    };
    let period_end = context.period_end(Utc::now().date_naive());

    let summary = usage_summary(&state.db, &caller.user_id, plan, period_end).await?;

    Ok(Json(usage_body(&summary)))
}

/// POST /billing/create-checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let account = billing::get_billing_account(&state.db, &caller.user_id).await?;
    if account.plan_tier()? != PlanTier::Free {
        return Err(ApiError::BadRequest(
            "User already has an active subscription".to_string(),
        ));
    }

    let config = &state.payments_config;
    let request = CheckoutRequest {
        price_id: config.individual_price_id.clone(),
        customer_id: account.customer_id.clone(),
        client_reference_id: caller.user_id.clone(),
        success_url: format!("{}/billing?success=true", config.app_domain),
        cancel_url: format!("{}/billing?canceled=true", config.app_domain),
        trial_period_days: Some(TRIAL_PERIOD_DAYS),
    };
    let redirect_url = state.payments.create_checkout_session(&request).await?;

    info!(user_id = %caller.user_id, "Checkout session created");

    Ok(Json(json!({ "redirect_url": redirect_url })))
}

/// POST /billing/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let account = billing::get_billing_account(&state.db, &caller.user_id).await?;
    let subscription_id = account
        .subscription_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("No active subscription".to_string()))?;

    state.payments.cancel_at_period_end(subscription_id).await?;
    billing::set_billing_canceled(&state.db, &caller.user_id, true).await?;

    info!(user_id = %caller.user_id, plan = %account.plan, "Subscription canceled");

    Ok(Json(json!({
        "success": true,
        "current_expiration": account.expiration,
        "canceled_plan": account.plan,
    })))
}

pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/billing", get(get_billing))
        .route("/billing/usage", get(get_usage))
        .route("/billing/create-checkout-session", post(create_checkout_session))
        .route("/billing/cancel", post(cancel_subscription))
}
