//! Organization endpoints
//!
//! An organization is a billing entity shared by its teachers. Its admin
//! manages the subscription; only PREMIUM and CLASSROOM organizations take
//! additional teachers.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use lingo_common::db::models::Organization;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db::{membership, organizations};
use crate::entitlements::effective_plan;
use crate::roles::{Caller, ResolvedRole, Role};
use crate::services::CheckoutRequest;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct JoinOrganizationRequest {
    pub organization_id: String,
}

fn require_teacher(role: &ResolvedRole) -> ApiResult<()> {
    if role.is_teacher() {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Only teachers can access this!".to_string()))
    }
}

/// The organization the caller administers
async fn administered_organization(state: &AppState, role: &ResolvedRole) -> ApiResult<Organization> {
    role.require(Role::Admin)?;
    let organization_id = role.admin_organization_id.as_deref().unwrap_or_default();

    organizations::get_organization(&state.db, organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))
}

/// GET /organization
pub async fn get_organization(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    require_teacher(&caller)?;
    let context = effective_plan(&state.db, &caller).await?;

    Ok(Json(json!({
        "organization_id": caller.organization_id.clone().unwrap_or_default(),
        "teacher_id": caller.teacher_id.clone().unwrap_or_default(),
        "plan": context.plan,
        "expiration_date": context.expiration,
    })))
}

/// GET /organization/plan
pub async fn get_plan(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Value>> {
    require_teacher(&caller)?;
    let context = effective_plan(&state.db, &caller).await?;

    Ok(Json(json!({ "plan": context.plan })))
}

/// POST /organization/create
pub async fn create_organization(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    caller.forbid(Role::Student)?;

    if caller.organization_id.is_some() || caller.is_admin() {
        return Err(ApiError::Conflict(
            "User already belongs to an organization".to_string(),
        ));
    }

    let (organization, teacher) =
        organizations::create_organization(&state.db, &caller.user_id).await?;
    info!(
        user_id = %caller.user_id,
        organization_id = %organization.id,
        "Organization created"
    );

    Ok(Json(json!({
        "organization_id": organization.id,
        "teacher_id": teacher.id,
    })))
}

/// POST /organization/join
pub async fn join_organization(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<JoinOrganizationRequest>,
) -> ApiResult<Json<Value>> {
    caller.forbid(Role::Student)?;

    let organization = organizations::get_organization(&state.db, request.organization_id.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    if !organization.plan_tier()?.allows_multiple_teachers() {
        return Err(ApiError::Forbidden(
            "Organization plan does not allow additional teachers".to_string(),
        ));
    }

    let teacher =
        membership::upsert_teacher(&state.db, &caller.user_id, Some(&organization.id)).await?;
    info!(
        user_id = %caller.user_id,
        organization_id = %organization.id,
        "Teacher joined organization"
    );

    Ok(Json(json!({ "teacher_id": teacher.id })))
}

/// POST /organization/payments/create-checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let organization = administered_organization(&state, &caller).await?;
    let config = &state.payments_config;

    let request = CheckoutRequest {
        price_id: config.organization_price_id.clone(),
        customer_id: organization.customer_id.clone(),
        client_reference_id: caller.user_id.clone(),
        success_url: format!("{}/organization?success=true", config.dashboard_domain),
        cancel_url: format!("{}/organization?canceled=true", config.dashboard_domain),
        trial_period_days: None,
    };
    let redirect_url = state.payments.create_checkout_session(&request).await?;

    info!(organization_id = %organization.id, "Organization checkout session created");

    Ok(Json(json!({ "redirect_url": redirect_url })))
}

/// POST /organization/payments/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Value>> {
    let organization = administered_organization(&state, &caller).await?;
    let subscription_id = organization
        .subscription_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Organization has no active subscription".to_string()))?;

    state.payments.cancel_at_period_end(subscription_id).await?;
    organizations::set_organization_canceled(&state.db, &organization.id, true).await?;

    info!(organization_id = %organization.id, "Organization subscription canceled");

    Ok(Json(json!({
        "success": true,
        "current_expiration": organization.expiration,
        "canceled_plan": organization.plan,
    })))
}

pub fn organization_routes() -> Router<AppState> {
    Router::new()
        .route("/organization", get(get_organization))
        .route("/organization/plan", get(get_plan))
        .route("/organization/create", post(create_organization))
        .route("/organization/join", post(join_organization))
        .route(
            "/organization/payments/create-checkout-session",
            post(create_checkout_session),
        )
        .route("/organization/payments/cancel", post(cancel_subscription))
}
