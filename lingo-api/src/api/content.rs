//! News and story endpoints
//!
//! Listings and single reads both honor the classroom allowlist for
//! enrolled students.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use lingo_common::db::models::{ContentType, NewsArticle, Story};
use lingo_common::storage::{content_key, story_page_key, NewsBody, Source, StoryPage};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::access::{check_content_access, listing_restriction};
use crate::db::content::{self, QueryParams};
use crate::pagination::parse_paging;
use crate::roles::Caller;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub language: Option<String>,
    pub cefr: Option<String>,
    pub subject: Option<String>,
    pub page: Option<String>,
    pub pagesize: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    pub id: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    #[serde(flatten)]
    pub article: NewsArticle,
    pub content: String,
    pub dictionary: Value,
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize)]
pub struct StoryPageResponse {
    #[serde(flatten)]
    pub story: Story,
    pub page: i64,
    pub content: String,
    pub dictionary: Value,
}

/// Required integer query parameter
pub(crate) fn parse_required_int(value: Option<&str>, name: &str) -> ApiResult<i64> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {} parameter", name)))?;

    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} parameter: must be an integer", name)))
}

/// Page index checked against `0..pages`
pub(crate) fn check_page(page: i64, pages: i64) -> ApiResult<u32> {
    if page < 0 || page >= pages {
        return Err(ApiError::BadRequest(format!(
            "Page {} out of range (0..{})",
            page, pages
        )));
    }
    u32::try_from(page).map_err(|_| ApiError::BadRequest(format!("Page {} out of range", page)))
}

fn listing_params(caller: &Caller, query: ListingQuery) -> ApiResult<QueryParams> {
    let paging = parse_paging(query.page.as_deref(), query.pagesize.as_deref())?;

    Ok(QueryParams {
        language: query.language.unwrap_or_default(),
        cefr: query.cefr.unwrap_or_default(),
        subject: query.subject.unwrap_or_default(),
        page: paging.page,
        page_size: paging.page_size,
        classroom_id: listing_restriction(caller),
    })
}

async fn load_blob<T: DeserializeOwned>(state: &AppState, key: &str) -> ApiResult<T> {
    let bytes = state.store.get(key).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Internal(format!("Malformed content blob {}: {}", key, e)))
}

/// GET /news/query
pub async fn query_news(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Value>> {
    let params = listing_params(&caller, query)?;
    let news = content::query_news(&state.db, &params).await?;

    Ok(Json(json!({ "news": news })))
}

/// GET /story/query
pub async fn query_stories(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Value>> {
    let params = listing_params(&caller, query)?;
    let stories = content::query_stories(&state.db, &params).await?;

    Ok(Json(json!({ "stories": stories })))
}

/// GET /news?id=
pub async fn get_news(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReadQuery>,
) -> ApiResult<Json<NewsResponse>> {
    let id = parse_required_int(query.id.as_deref(), "id")?;
    check_content_access(&state.db, &caller, ContentType::News, id).await?;

    let article = content::get_news(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("News article not found".to_string()))?;

    let key = content_key(
        &article.language,
        &article.cefr_level,
        &article.topic,
        ContentType::News,
        article.date_created,
    );
    let body: NewsBody = load_blob(&state, &key).await?;

    Ok(Json(NewsResponse {
        article,
        content: body.article,
        dictionary: body.dictionary,
        sources: body.sources,
    }))
}

/// GET /story?id=&page=
pub async fn get_story(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReadQuery>,
) -> ApiResult<Json<StoryPageResponse>> {
    let id = parse_required_int(query.id.as_deref(), "id")?;
    let page = parse_required_int(query.page.as_deref(), "page")?;
    check_content_access(&state.db, &caller, ContentType::Story, id).await?;

    let story = content::get_story(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Story not found".to_string()))?;
    let page_index = check_page(page, story.pages)?;

    let key = story_page_key(
        &story.language,
        &story.cefr_level,
        &story.topic,
        story.date_created,
        page_index,
    );
    let body: StoryPage = load_blob(&state, &key).await?;

    Ok(Json(StoryPageResponse {
        story,
        page,
        content: body.content,
        dictionary: body.dictionary,
    }))
}

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/news/query", get(query_news))
        .route("/story/query", get(query_stories))
        .route("/news", get(get_news))
        .route("/story", get(get_story))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bad_request(result: ApiResult<impl std::fmt::Debug>) -> String {
        match result {
            Err(ApiError::BadRequest(msg)) => msg,
            other => panic!("expected bad request, got {:?}", other),
        }
    }

    #[test]
    fn test_required_int() {
        assert_eq!(parse_required_int(Some(" 42 "), "id").unwrap(), 42);
        assert_eq!(
            bad_request(parse_required_int(None, "id")),
            "Missing id parameter"
        );
        assert!(bad_request(parse_required_int(Some("abc"), "page")).starts_with("Invalid page"));
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(check_page(0, 3).unwrap(), 0);
        assert_eq!(check_page(2, 3).unwrap(), 2);
        bad_request(check_page(3, 3));
        bad_request(check_page(-1, 3));
        bad_request(check_page(0, 0));
    }
}
