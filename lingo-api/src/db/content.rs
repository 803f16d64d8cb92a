//! Generated news articles and stories
//!
//! Listing filters treat an empty value or `any` as "no filter". Results are
//! newest first and paged with LIMIT/OFFSET.

use chrono::{DateTime, NaiveDate, Utc};
use lingo_common::db::models::{Audiobook, ContentType, NewsArticle, Story};
use lingo_common::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const NEWS_COLUMNS: &str =
    "c.id, c.title, c.language, c.topic, c.cefr_level, c.preview_text, c.created_at, c.date_created";

const STORY_COLUMNS: &str = "c.id, c.title, c.language, c.topic, c.cefr_level, c.preview_text, \
     c.pages, c.created_at, c.date_created";

/// Filters and paging for content listings
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub language: String,
    pub cefr: String,
    pub subject: String,
    /// 1-based
    pub page: i64,
    pub page_size: i64,
    /// Restrict to this classroom's allowlist
    pub classroom_id: Option<String>,
}

impl QueryParams {
    /// Saturates, so an out-of-range page reads past the end and is empty
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size.max(0))
    }
}

/// Which allowlist state a teacher listing is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistFilter {
    All,
    Accepted,
    Rejected,
}

impl AllowlistFilter {
    /// `accepted` and `rejected` select a side; anything else lists everything
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("accepted") => AllowlistFilter::Accepted,
            Some("rejected") => AllowlistFilter::Rejected,
            _ => AllowlistFilter::All,
        }
    }
}

/// One row of the teacher's content review listing
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewItem {
    pub content_type: String,
    pub id: i64,
    pub title: String,
    pub language: String,
    pub topic: String,
    pub cefr_level: String,
    pub preview_text: String,
    pub created_at: DateTime<Utc>,
    pub date_created: NaiveDate,
    pub accepted: bool,
}

fn is_filter(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case("any")
}

/// Append `WHERE`/`AND` conditions for the language, level and subject filters
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &QueryParams) {
    qb.push(" WHERE 1 = 1");
    if is_filter(&params.language) {
        qb.push(" AND c.language = ")
            .push_bind(params.language.trim().to_string())
            .push(" COLLATE NOCASE");
    }
    if is_filter(&params.cefr) {
        qb.push(" AND c.cefr_level = ")
            .push_bind(params.cefr.trim().to_uppercase());
    }
    if is_filter(&params.subject) {
        qb.push(" AND c.topic = ")
            .push_bind(params.subject.trim().to_string())
            .push(" COLLATE NOCASE");
    }
}

fn push_paging(qb: &mut QueryBuilder<'_, Sqlite>, params: &QueryParams) {
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(params.page_size)
        .push(" OFFSET ")
        .push_bind(params.offset());
}

fn listing_query<'a>(
    columns: &str,
    content_type: ContentType,
    params: &'a QueryParams,
) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM {} c",
        columns,
        content_type.table()
    ));

    if let Some(classroom_id) = &params.classroom_id {
        qb.push(" INNER JOIN accepted_content a ON a.content_id = c.id AND a.content_type = ")
            .push_bind(content_type.as_str())
            .push(" AND a.classroom_id = ")
            .push_bind(classroom_id.clone());
    }

    push_filters(&mut qb, params);
    push_paging(&mut qb, params);
    qb
}

pub async fn query_news(pool: &SqlitePool, params: &QueryParams) -> Result<Vec<NewsArticle>> {
    let rows = listing_query(NEWS_COLUMNS, ContentType::News, params)
        .build_query_as::<NewsArticle>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn query_stories(pool: &SqlitePool, params: &QueryParams) -> Result<Vec<Story>> {
    let rows = listing_query(STORY_COLUMNS, ContentType::Story, params)
        .build_query_as::<Story>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Content listing for a teacher reviewing a classroom's allowlist.
///
/// `content_type` None lists news and stories together.
pub async fn review_listing(
    pool: &SqlitePool,
    classroom_id: &str,
    content_type: Option<ContentType>,
    allowlist: AllowlistFilter,
    params: &QueryParams,
) -> Result<Vec<ReviewItem>> {
    let types: &[ContentType] = match content_type {
        Some(ContentType::News) => &[ContentType::News],
        Some(ContentType::Story) => &[ContentType::Story],
        None => &[ContentType::News, ContentType::Story],
    };

    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT * FROM (");
    for (i, content_type) in types.iter().enumerate() {
        if i > 0 {
            qb.push(" UNION ALL ");
        }
        push_review_branch(&mut qb, classroom_id, *content_type, allowlist, params);
    }
    qb.push(")");
    push_paging(&mut qb, params);

    let rows = qb.build_query_as::<ReviewItem>().fetch_all(pool).await?;
    Ok(rows)
}

fn push_review_branch(
    qb: &mut QueryBuilder<'_, Sqlite>,
    classroom_id: &str,
    content_type: ContentType,
    allowlist: AllowlistFilter,
    params: &QueryParams,
) {
    qb.push("SELECT ")
        .push_bind(content_type.as_str())
        .push(
            " AS content_type, c.id, c.title, c.language, c.topic, c.cefr_level, \
             c.preview_text, c.created_at, c.date_created, ",
        );
    push_accepted(qb, classroom_id, content_type);
    qb.push(format!(" AS accepted FROM {} c", content_type.table()));

    push_filters(qb, params);
    match allowlist {
        AllowlistFilter::Accepted => {
            qb.push(" AND ");
            push_accepted(qb, classroom_id, content_type);
        }
        AllowlistFilter::Rejected => {
            qb.push(" AND NOT ");
            push_accepted(qb, classroom_id, content_type);
        }
        AllowlistFilter::All => {}
    }
}

/// `EXISTS (...)` for "row `c` is on the classroom's allowlist"
fn push_accepted(qb: &mut QueryBuilder<'_, Sqlite>, classroom_id: &str, content_type: ContentType) {
    qb.push("EXISTS (SELECT 1 FROM accepted_content a WHERE a.classroom_id = ")
        .push_bind(classroom_id.to_string())
        .push(" AND a.content_type = ")
        .push_bind(content_type.as_str())
        .push(" AND a.content_id = c.id)");
}

pub async fn get_news(pool: &SqlitePool, id: i64) -> Result<Option<NewsArticle>> {
    let row = sqlx::query_as::<_, NewsArticle>(&format!(
        "SELECT {} FROM news c WHERE c.id = ?",
        NEWS_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_story(pool: &SqlitePool, id: i64) -> Result<Option<Story>> {
    let row = sqlx::query_as::<_, Story>(&format!(
        "SELECT {} FROM stories c WHERE c.id = ?",
        STORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_audiobook(
    pool: &SqlitePool,
    content_type: ContentType,
    content_id: i64,
) -> Result<Option<Audiobook>> {
    let row = sqlx::query_as::<_, Audiobook>(
        r#"
        SELECT content_type, content_id, tier, pages
        FROM audiobooks
        WHERE content_type = ? AND content_id = ?
        "#,
    )
    .bind(content_type.as_str())
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
