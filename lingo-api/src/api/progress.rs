//! Daily question progress endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use lingo_common::db::models::DailyProgress;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Subject;
use crate::db::{profiles, progress};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct IncrementQuery {
    pub amount: Option<String>,
}

fn parse_amount(raw: Option<&str>) -> ApiResult<u32> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Err(ApiError::BadRequest("Amount parameter is required".to_string()));
    };
    let amount = raw
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest("Invalid amount parameter".to_string()))?;
    if amount < 0 {
        return Err(ApiError::BadRequest(
            "Amount parameter must be non-negative".to_string(),
        ));
    }
    u32::try_from(amount).map_err(|_| ApiError::BadRequest("Amount parameter is too large".to_string()))
}

/// GET /progress
pub async fn get_today(
    State(state): State<AppState>,
    subject: Subject,
) -> ApiResult<Json<DailyProgress>> {
    let today = Utc::now().date_naive();
    let progress = progress::today_progress(&state.db, subject.as_str(), today).await?;
    Ok(Json(progress))
}

/// GET /progress/streak
pub async fn get_streak(State(state): State<AppState>, subject: Subject) -> ApiResult<Json<Value>> {
    let today = Utc::now().date_naive();
    let streak = progress::streak(&state.db, subject.as_str(), today).await?;

    Ok(Json(json!({
        "streak": streak.days,
        "completed_today": streak.completed_today,
    })))
}

/// GET or POST /progress/increment?amount=N
///
/// The goal comes from the caller's profile, so a profile must exist.
pub async fn increment(
    State(state): State<AppState>,
    subject: Subject,
    Query(query): Query<IncrementQuery>,
) -> ApiResult<Json<DailyProgress>> {
    let amount = parse_amount(query.amount.as_deref())?;
    let goal = profiles::daily_goal(&state.db, subject.as_str())
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    let today = Utc::now().date_naive();
    let progress = progress::increment(&state.db, subject.as_str(), today, amount, goal).await?;
    if progress.goal_met {
        info!(user_id = %subject.as_str(), questions = progress.questions_completed, "Daily goal met");
    }

    Ok(Json(progress))
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(get_today))
        .route("/progress/streak", get(get_streak))
        .route("/progress/increment", get(increment).post(increment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: ApiResult<u32>) -> String {
        match result {
            Err(ApiError::BadRequest(msg)) => msg,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount(Some("3")).unwrap(), 3);
        assert_eq!(parse_amount(Some("0")).unwrap(), 0);
        assert_eq!(message(parse_amount(None)), "Amount parameter is required");
        assert_eq!(message(parse_amount(Some("three"))), "Invalid amount parameter");
        assert_eq!(message(parse_amount(Some("-2"))), "Amount parameter must be non-negative");
        assert_eq!(message(parse_amount(Some("9223372036854775807"))), "Amount parameter is too large");
    }
}
