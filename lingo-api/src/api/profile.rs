//! Learner profile endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Subject;
use crate::db::profiles::{self, ProfileFields, UpsertOutcome};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub learning_language: String,
    #[serde(default)]
    pub skill_level: String,
    #[serde(default)]
    pub interested_topics: Vec<String>,
    #[serde(default)]
    pub daily_questions_goal: i64,
}

impl UpsertProfileRequest {
    fn into_fields(self) -> ApiResult<ProfileFields> {
        let username = self.username.trim();
        let learning_language = self.learning_language.trim();
        let skill_level = self.skill_level.trim();

        if username.is_empty() || learning_language.is_empty() || skill_level.is_empty() {
            return Err(ApiError::BadRequest(
                "Username, learning language, and skill level are required".to_string(),
            ));
        }
        if self.daily_questions_goal < 0 {
            return Err(ApiError::BadRequest(
                "Daily questions goal must be non-negative".to_string(),
            ));
        }

        Ok(ProfileFields {
            username: username.to_string(),
            learning_language: learning_language.to_string(),
            skill_level: skill_level.to_string(),
            interested_topics: self.interested_topics,
            daily_questions_goal: self.daily_questions_goal,
        })
    }
}

/// GET /profile
pub async fn get_profile(State(state): State<AppState>, subject: Subject) -> ApiResult<Json<Value>> {
    let profile = profiles::get_profile(&state.db, subject.as_str())
        .await?
        .ok_or(ApiError::ProfileNotFound)?;

    Ok(Json(json!({
        "username": profile.username,
        "learning_language": profile.learning_language,
        "skill_level": profile.skill_level,
        "interested_topics": profile.interested_topics,
        "daily_questions_goal": profile.daily_questions_goal,
    })))
}

/// POST /profile/upsert
pub async fn upsert_profile(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<UpsertProfileRequest>,
) -> ApiResult<Json<Value>> {
    let fields = request.into_fields()?;

    match profiles::upsert_profile(&state.db, subject.as_str(), &fields).await? {
        UpsertOutcome::Saved(id) => {
            info!(user_id = %subject.as_str(), profile_id = id, "Profile saved");
            Ok(Json(json!({
                "message": "Profile updated successfully",
                "id": id,
            })))
        }
        UpsertOutcome::UsernameTaken => Err(ApiError::Conflict("Username already taken".to_string())),
    }
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile/upsert", post(upsert_profile))
}
