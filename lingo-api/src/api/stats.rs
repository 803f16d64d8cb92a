//! Study statistics endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Subject;
use crate::db::decks;
use crate::db::stats::{self, StudySession};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    pub deck_id: i64,
    pub cards_studied: i64,
    #[serde(default)]
    pub cards_mastered: i64,
    /// Defaults to now
    #[serde(default)]
    pub study_date: Option<DateTime<Utc>>,
}

/// GET /stats
pub async fn list_stats(State(state): State<AppState>, subject: Subject) -> ApiResult<Json<Value>> {
    let stats = stats::list_stats(&state.db, subject.as_str()).await?;
    Ok(Json(json!({ "stats": stats })))
}

/// POST /stats/record
pub async fn record_session(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<RecordSessionRequest>,
) -> ApiResult<Json<Value>> {
    if request.cards_studied < 0 || request.cards_mastered < 0 {
        return Err(ApiError::BadRequest(
            "Card counts must be non-negative".to_string(),
        ));
    }

    let deck = decks::get_visible_deck(&state.db, request.deck_id, subject.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;

    let session = StudySession {
        deck_id: deck.id,
        cards_studied: request.cards_studied,
        cards_mastered: request.cards_mastered,
        study_date: request.study_date.unwrap_or_else(Utc::now),
    };
    stats::record_session(&state.db, subject.as_str(), &session).await?;
    info!(
        user_id = %subject.as_str(),
        deck_id = deck.id,
        cards_studied = session.cards_studied,
        "Study session recorded"
    );

    Ok(Json(json!({ "message": "Study session recorded successfully" })))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(list_stats))
        .route("/stats/record", post(record_session))
}
