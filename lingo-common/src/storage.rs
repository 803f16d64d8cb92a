//! Object storage for generated content
//!
//! Generated articles and stories are stored as JSON blobs under
//! deterministic keys derived from their language, level, subject and date.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::db::models::ContentType;
use crate::{Error, Result};

/// Key of the blob holding a generated article or story:
/// `<language>/<CEFR>/<Subject>/<Type>/<CEFR>_<Type>_<Subject>_<YYYY-MM-DD>.json`
pub fn content_key(
    language: &str,
    cefr_level: &str,
    subject: &str,
    content_type: ContentType,
    date: NaiveDate,
) -> String {
    let language = language.trim().to_lowercase();
    let cefr = cefr_level.trim().to_uppercase();
    let subject = title_case(subject);
    let kind = content_type.as_str();

    format!(
        "{language}/{cefr}/{subject}/{kind}/{cefr}_{kind}_{subject}_{}.json",
        date.format("%Y-%m-%d")
    )
}

/// Key of one page of a story, stored next to the story blob
pub fn story_page_key(
    language: &str,
    cefr_level: &str,
    subject: &str,
    date: NaiveDate,
    page: u32,
) -> String {
    let base = content_key(language, cefr_level, subject, ContentType::Story, date);
    let stem = base.trim_end_matches(".json");
    format!("{}/page_{}.json", stem, page)
}

/// Key of one page of narrated audio for an article or story
pub fn audiobook_key(
    language: &str,
    cefr_level: &str,
    subject: &str,
    content_type: ContentType,
    date: NaiveDate,
    page: u32,
) -> String {
    let language = language.trim().to_lowercase();
    let cefr = cefr_level.trim().to_uppercase();
    let subject = title_case(subject);
    let kind = content_type.as_str();

    format!(
        "{language}/{cefr}/{subject}/{kind}/audiobook_{cefr}_{kind}_{subject}_{}_{page}.json",
        date.format("%Y-%m-%d")
    )
}

// ========================================
// Blob shapes
// ========================================

/// Web source cited by a news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Stored body of a news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsBody {
    pub article: String,
    /// Word and sentence translations; opaque to this service
    #[serde(default)]
    pub dictionary: serde_json::Value,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Stored body of one story page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPage {
    pub content: String,
    #[serde(default)]
    pub dictionary: serde_json::Value,
}

/// Upper-case the first letter of every whitespace-separated word
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Blob store keyed by `/`-separated paths
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Fetch a blob; a missing key is [`Error::NotFound`]
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Time-limited link to an existing blob
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Object store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::InvalidInput(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        tracing::debug!(key, "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Local files never expire; the link is only issued for existing objects.
    async fn presign(&self, key: &str, _ttl: Duration) -> Result<String> {
        let path = self.resolve(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("Object {}", key)));
        }
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_content_key_layout() {
        let key = content_key("French", "b1", "daily life", ContentType::News, date());
        assert_eq!(
            key,
            "french/B1/Daily Life/News/B1_News_Daily Life_2024-03-09.json"
        );
    }

    #[test]
    fn test_story_page_key() {
        let key = story_page_key("Spanish", "A2", "travel", date(), 3);
        assert_eq!(
            key,
            "spanish/A2/Travel/Story/A2_Story_Travel_2024-03-09/page_3.json"
        );
    }

    #[test]
    fn test_audiobook_key() {
        let key = audiobook_key("German", "c1", "politics", ContentType::News, date(), 0);
        assert_eq!(
            key,
            "german/C1/Politics/News/audiobook_C1_News_Politics_2024-03-09_0.json"
        );
    }

    #[test]
    fn test_news_body_tolerates_missing_optional_fields() {
        let body: NewsBody = serde_json::from_str(r#"{"article": "Bonjour"}"#).unwrap();
        assert_eq!(body.article, "Bonjour");
        assert!(body.sources.is_empty());
        assert!(body.dictionary.is_null());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("sCIENCE and tech"), "Science And Tech");
        assert_eq!(title_case(""), "");
    }

    #[tokio::test]
    async fn test_fs_store_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put("a/b/c.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("a/b/c.json").await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_fs_store_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(matches!(
            store.get("missing.json").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_presign_requires_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let ttl = Duration::from_secs(300);

        assert!(matches!(
            store.presign("audio/p0.json", ttl).await,
            Err(Error::NotFound(_))
        ));

        store.put("audio/p0.json", b"{}".to_vec()).await.unwrap();
        let url = store.presign("audio/p0.json", ttl).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("audio/p0.json"));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(matches!(
            store.put("../escape.json", vec![]).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.get("/etc/passwd").await,
            Err(Error::InvalidInput(_))
        ));
    }
}
