//! Content generation backend client
//!
//! The backend writes an article or a paged story for one language, level
//! and subject. It is reached over HTTP; tests use an in-process fake.

use async_trait::async_trait;
use lingo_common::db::models::ContentType;
use lingo_common::storage::{Source, StoryPage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::queue::JobSpec;

const USER_AGENT: &str = concat!("lingo-gen/", env!("CARGO_PKG_VERSION"));

/// Generation can take a while; allow more than a plain API call
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Generator error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid generator response: {0}")]
    Parse(String),
}

/// A generated news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    #[serde(default)]
    pub preview_text: String,
    pub article: String,
    #[serde(default)]
    pub dictionary: serde_json::Value,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// A generated story, already split into pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub title: String,
    #[serde(default)]
    pub preview_text: String,
    pub pages: Vec<StoryPage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedContent {
    News(GeneratedArticle),
    Story(GeneratedStory),
}

impl GeneratedContent {
    pub fn title(&self) -> &str {
        match self {
            GeneratedContent::News(article) => &article.title,
            GeneratedContent::Story(story) => &story.title,
        }
    }
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, spec: &JobSpec) -> Result<GeneratedContent, GeneratorError>;
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    language: &'a str,
    cefr_level: &'a str,
    subject: &'a str,
}

/// Generator reached at `<base>/news` and `<base>/story`
pub struct HttpContentGenerator {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentGenerator {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, GeneratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        spec: &JobSpec,
    ) -> Result<R, GeneratorError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, language = %spec.language, cefr = %spec.cefr_level, "Requesting generation");

        let mut request = self.http_client.post(&url).json(&GenerationRequest {
            language: &spec.language,
            cefr_level: &spec.cefr_level,
            subject: &spec.subject,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api(status.as_u16(), body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, spec: &JobSpec) -> Result<GeneratedContent, GeneratorError> {
        match spec.content_type {
            ContentType::News => self.post("news", spec).await.map(GeneratedContent::News),
            ContentType::Story => {
                let story: GeneratedStory = self.post("story", spec).await?;
                if story.pages.is_empty() {
                    return Err(GeneratorError::Parse("story has no pages".to_string()));
                }
                Ok(GeneratedContent::Story(story))
            }
        }
    }
}
