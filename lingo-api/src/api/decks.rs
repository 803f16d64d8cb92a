//! Deck and flashcard endpoints
//!
//! System decks are immutable for everyone. Public decks are readable by
//! everyone and never accept flashcard writes, not even from their owner.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lingo_common::db::models::{Deck, Flashcard};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Subject;
use crate::db::decks::{self, FlashcardChanges};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateDeckRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFlashcardRequest {
    pub deck_id: i64,
    pub front_content: String,
    pub back_content: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFlashcardRequest {
    pub front_content: Option<String>,
    pub back_content: Option<String>,
    pub source_url: Option<String>,
    pub confidence_level: Option<i64>,
    #[serde(default)]
    pub reviewed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeckWithFlashcards {
    #[serde(flatten)]
    pub deck: Deck,
    pub flashcards: Vec<Flashcard>,
}

/// Flashcards of `deck` may be created, changed or deleted by `user_id`
fn ensure_cards_writable(deck: &Deck, user_id: &str, not_owner: &str) -> ApiResult<()> {
    if deck.is_system {
        return Err(ApiError::Forbidden("System decks cannot be modified".to_string()));
    }
    if deck.is_public {
        return Err(ApiError::Forbidden("Public decks cannot be modified".to_string()));
    }
    if !deck.is_owned_by(user_id) {
        return Err(ApiError::Forbidden(not_owner.to_string()));
    }
    Ok(())
}

/// Deck of an existing flashcard, checked for write access
async fn writable_card_deck(state: &AppState, card_id: i64, user_id: &str) -> ApiResult<Deck> {
    let card = decks::get_flashcard(&state.db, card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Flashcard not found".to_string()))?;

    let deck = decks::get_deck(&state.db, card.deck_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Flashcard not found".to_string()))?;

    if !deck.is_owned_by(user_id) {
        return Err(ApiError::Forbidden("Access denied to this flashcard".to_string()));
    }
    ensure_cards_writable(&deck, user_id, "Access denied to this flashcard")?;
    Ok(deck)
}

/// GET /decks
pub async fn list_decks(
    State(state): State<AppState>,
    subject: Subject,
) -> ApiResult<Json<Value>> {
    let decks = decks::list_decks(&state.db, subject.as_str()).await?;
    Ok(Json(json!({ "decks": decks })))
}

/// GET /decks/:id
pub async fn get_deck(
    State(state): State<AppState>,
    subject: Subject,
    Path(deck_id): Path<i64>,
) -> ApiResult<Json<DeckWithFlashcards>> {
    let deck = decks::get_visible_deck(&state.db, deck_id, subject.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;
    let flashcards = decks::flashcards_for_deck(&state.db, deck.id).await?;

    Ok(Json(DeckWithFlashcards { deck, flashcards }))
}

/// POST /decks
pub async fn create_deck(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<CreateDeckRequest>,
) -> ApiResult<(StatusCode, Json<Deck>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Deck name is required".to_string()));
    }

    let deck = decks::create_deck(&state.db, subject.as_str(), name, request.description.trim()).await?;
    info!(user_id = %subject.as_str(), deck_id = deck.id, "Deck created");

    Ok((StatusCode::CREATED, Json(deck)))
}

/// DELETE /decks/:id
pub async fn delete_deck(
    State(state): State<AppState>,
    subject: Subject,
    Path(deck_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let deck = decks::get_visible_deck(&state.db, deck_id, subject.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;

    if deck.is_system {
        return Err(ApiError::Forbidden("System decks cannot be deleted".to_string()));
    }
    if !deck.is_owned_by(subject.as_str()) {
        return Err(ApiError::Forbidden("Public decks cannot be deleted".to_string()));
    }

    decks::delete_deck(&state.db, deck.id).await?;
    info!(user_id = %subject.as_str(), deck_id, "Deck deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /flashcards
pub async fn create_flashcard(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<CreateFlashcardRequest>,
) -> ApiResult<(StatusCode, Json<Flashcard>)> {
    let deck = decks::get_visible_deck(&state.db, request.deck_id, subject.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;
    ensure_cards_writable(&deck, subject.as_str(), "Access denied to this deck")?;

    if request.front_content.trim().is_empty() || request.back_content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Flashcards need front and back content".to_string(),
        ));
    }

    let card = decks::create_flashcard(
        &state.db,
        deck.id,
        &request.front_content,
        &request.back_content,
        request.source_url.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(card)))
}

/// PUT /flashcards/:id
pub async fn update_flashcard(
    State(state): State<AppState>,
    subject: Subject,
    Path(card_id): Path<i64>,
    Json(request): Json<UpdateFlashcardRequest>,
) -> ApiResult<Json<Flashcard>> {
    writable_card_deck(&state, card_id, subject.as_str()).await?;

    let changes = FlashcardChanges {
        front_content: request.front_content,
        back_content: request.back_content,
        source_url: request.source_url,
        confidence_level: request.confidence_level,
        reviewed: request.reviewed,
    };
    let card = decks::update_flashcard(&state.db, card_id, &changes).await?;

    Ok(Json(card))
}

/// DELETE /flashcards/:id
pub async fn delete_flashcard(
    State(state): State<AppState>,
    subject: Subject,
    Path(card_id): Path<i64>,
) -> ApiResult<StatusCode> {
    writable_card_deck(&state, card_id, subject.as_str()).await?;
    decks::delete_flashcard(&state.db, card_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn deck_routes() -> Router<AppState> {
    Router::new()
        .route("/decks", get(list_decks).post(create_deck))
        .route("/decks/:id", get(get_deck).delete(delete_deck))
        .route("/flashcards", post(create_flashcard))
        .route("/flashcards/:id", put(update_flashcard).delete(delete_flashcard))
}
