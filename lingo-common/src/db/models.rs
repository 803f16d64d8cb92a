//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, PlanTier, Result};

/// CEFR proficiency levels, easiest first
pub const CEFR_LEVELS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

/// Kind of generated reading content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    News,
    Story,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::News => "News",
            ContentType::Story => "Story",
        }
    }

    /// Table holding rows of this content type
    pub fn table(&self) -> &'static str {
        match self {
            ContentType::News => "news",
            ContentType::Story => "stories",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(ContentType::News),
            "story" | "stories" => Ok(ContentType::Story),
            other => Err(Error::InvalidInput(format!(
                "Content type must be News or Story, got '{}'",
                other
            ))),
        }
    }
}

// ========================================
// Membership
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Teacher {
    pub id: String,
    pub user_id: String,
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: String,
    pub user_id: String,
    pub classroom_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Classroom {
    pub id: String,
    pub teacher_id: String,
    pub name: String,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: String,
    pub admin_id: String,
    pub plan: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub expiration: Option<NaiveDate>,
    pub canceled: bool,
}

impl Organization {
    pub fn plan_tier(&self) -> Result<PlanTier> {
        self.plan.parse()
    }
}

// ========================================
// Billing
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingAccount {
    pub user_id: String,
    pub plan: String,
    pub expiration: Option<NaiveDate>,
    pub canceled: bool,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl BillingAccount {
    pub fn plan_tier(&self) -> Result<PlanTier> {
        self.plan.parse()
    }
}

// ========================================
// Decks and flashcards
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deck {
    pub id: i64,
    /// None for system decks
    pub user_id: Option<String>,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flashcard {
    pub id: i64,
    pub deck_id: i64,
    pub front_content: String,
    pub back_content: String,
    pub source_url: Option<String>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: i64,
    pub confidence_level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-deck study totals for one learner
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudyStats {
    pub id: i64,
    pub user_id: String,
    pub deck_id: i64,
    pub deck_name: String,
    pub cards_studied: i64,
    pub cards_mastered: i64,
    pub last_study_date: DateTime<Utc>,
    pub study_streak_days: i64,
}

// ========================================
// Learner
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub learning_language: String,
    pub skill_level: String,
    /// Stored as a JSON array
    pub interested_topics: sqlx::types::Json<Vec<String>>,
    pub daily_questions_goal: i64,
}

/// Questions answered by one learner on one calendar day (UTC)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyProgress {
    pub user_id: String,
    pub date: NaiveDate,
    pub questions_completed: i64,
    pub goal_met: bool,
}

// ========================================
// Generated content
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsArticle {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub topic: String,
    pub cefr_level: String,
    pub preview_text: String,
    pub created_at: DateTime<Utc>,
    pub date_created: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub topic: String,
    pub cefr_level: String,
    pub preview_text: String,
    pub pages: i64,
    pub created_at: DateTime<Utc>,
    pub date_created: NaiveDate,
}

/// Narrated version of a news article or story
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Audiobook {
    pub content_type: String,
    pub content_id: i64,
    /// BASIC or PREMIUM narration
    pub tier: String,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenerationJob {
    pub id: i64,
    pub language: String,
    pub cefr_level: String,
    pub subject: String,
    pub content_type: String,
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
}
