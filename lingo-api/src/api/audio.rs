//! Speech endpoints and audiobook links
//!
//! Natural voices, premium recognition and audiobook pages are metered; the
//! allowance is consumed before the provider is called.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use lingo_common::db::models::ContentType;
use lingo_common::storage::audiobook_key;
use lingo_common::Feature;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::content::{check_page, parse_required_int};
use crate::access::check_content_access;
use crate::db::content;
use crate::entitlements::consume;
use crate::roles::Caller;
use crate::services::{SynthesisRequest, TranscriptionRequest};
use crate::{ApiError, ApiResult, AppState};

/// Lifetime of an audiobook page link
const AUDIOBOOK_LINK_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub sentence: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudiobookQuery {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub id: Option<String>,
    pub page: Option<String>,
}

/// Metered feature for an audiobook narration tier
fn audiobook_feature(tier: &str) -> Option<Feature> {
    match tier.trim().to_ascii_uppercase().as_str() {
        "BASIC" => Some(Feature::BasicAudiobooks),
        "PREMIUM" => Some(Feature::PremiumAudiobooks),
        _ => None,
    }
}

/// GET /audio
pub async fn status() -> Json<Value> {
    Json(json!({ "status": "live" }))
}

/// POST /audio/translate
pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Json<Value>> {
    let sentence = state
        .speech
        .translate(&request.sentence, &request.source, &request.target)
        .await?;

    Ok(Json(json!({ "sentence": sentence })))
}

/// POST /audio/tts
pub async fn text_to_speech(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SynthesisRequest>,
) -> ApiResult<Json<Value>> {
    if request.natural {
        consume(&state.db, &caller, Feature::NaturalTts, 1).await?;
    }

    let audio_content = state.speech.synthesize(&request).await?;

    Ok(Json(json!({ "audio_content": audio_content })))
}

/// POST /audio/stt
pub async fn speech_to_text(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<TranscriptionRequest>,
) -> ApiResult<Json<Value>> {
    if request.premium {
        consume(&state.db, &caller, Feature::PremiumStt, 1).await?;
    }

    let transcript = state.speech.transcribe(&request).await?;

    Ok(Json(json!({ "transcript": transcript })))
}

/// GET /audio/audiobook?type=&id=&page=
pub async fn audiobook(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AudiobookQuery>,
) -> ApiResult<Json<Value>> {
    let content_type = match query.content_type.as_deref().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("news") => ContentType::News,
        Some(t) if t.eq_ignore_ascii_case("story") => ContentType::Story,
        _ => {
            return Err(ApiError::BadRequest(
                "type must be news or story".to_string(),
            ))
        }
    };
    let id = parse_required_int(query.id.as_deref(), "id")?;
    let page = parse_required_int(query.page.as_deref(), "page")?;

    check_content_access(&state.db, &caller, content_type, id).await?;

    let book = content::get_audiobook(&state.db, content_type, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Audiobook not found".to_string()))?;
    let page_index = check_page(page, book.pages)?;

    let feature = audiobook_feature(&book.tier).ok_or_else(|| {
        ApiError::Internal(format!("Unknown audiobook tier {} for {} {}", book.tier, content_type, id))
    })?;

    let (language, cefr_level, topic, date_created) = match content_type {
        ContentType::News => content::get_news(&state.db, id)
            .await?
            .map(|n| (n.language, n.cefr_level, n.topic, n.date_created)),
        ContentType::Story => content::get_story(&state.db, id)
            .await?
            .map(|s| (s.language, s.cefr_level, s.topic, s.date_created)),
    }
    .ok_or_else(|| ApiError::NotFound(format!("{} not found", content_type)))?;

    // A missing audio blob must not use up the allowance
    let key = audiobook_key(&language, &cefr_level, &topic, content_type, date_created, page_index);
    let url = state.store.presign(&key, AUDIOBOOK_LINK_TTL).await?;

    consume(&state.db, &caller, feature, 1).await?;
    debug!(user_id = %caller.user_id, %content_type, id, page, "Audiobook link issued");

    Ok(Json(json!({
        "url": url,
        "expires_in": AUDIOBOOK_LINK_TTL.as_secs(),
    })))
}

pub fn audio_routes() -> Router<AppState> {
    Router::new()
        .route("/audio", get(status))
        .route("/audio/translate", post(translate))
        .route("/audio/tts", post(text_to_speech))
        .route("/audio/stt", post(speech_to_text))
        .route("/audio/audiobook", get(audiobook))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audiobook_tiers() {
        assert_eq!(audiobook_feature("BASIC"), Some(Feature::BasicAudiobooks));
        assert_eq!(audiobook_feature("premium"), Some(Feature::PremiumAudiobooks));
        assert_eq!(audiobook_feature("GOLD"), None);
    }
}
