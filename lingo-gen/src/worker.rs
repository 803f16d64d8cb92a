//! Generation worker
//!
//! Claims a batch of pending jobs and processes them one at a time: call
//! the generator (with retries), store the body in the object store, then
//! upsert the listing row. A job that still fails after its retries is
//! marked failed and the batch moves on. A job whose status cannot be
//! written stays running and is reclaimed once its lease runs out.

use chrono::{DateTime, Duration, Utc};
use lingo_common::db::models::{ContentType, GenerationJob};
use lingo_common::retry::retry_with_backoff;
use lingo_common::storage::{content_key, story_page_key, NewsBody, ObjectStore};
use lingo_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::generator::{ContentGenerator, GeneratedArticle, GeneratedContent, GeneratedStory};
use crate::queue::{self, JobSpec, DEFAULT_CLAIM_SIZE, DEFAULT_LEASE_SECS};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Jobs claimed per batch
    pub claim_size: i64,
    /// Generator calls per job before it is marked failed
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    /// Seconds a claimed job is reserved for this worker
    pub lease_secs: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            claim_size: DEFAULT_CLAIM_SIZE,
            max_attempts: 3,
            retry_base_ms: 100,
            lease_secs: DEFAULT_LEASE_SECS,
        }
    }
}

/// Outcome counts for one or more batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub done: usize,
    pub failed: usize,
    /// Jobs left running because their status update failed
    pub unrecorded: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: BatchReport) {
        self.claimed += other.claimed;
        self.done += other.done;
        self.failed += other.failed;
        self.unrecorded += other.unrecorded;
    }
}

pub struct Worker {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
    generator: Arc<dyn ContentGenerator>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        pool: SqlitePool,
        store: Arc<dyn ObjectStore>,
        generator: Arc<dyn ContentGenerator>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            pool,
            store,
            generator,
            settings,
        }
    }

    /// Claim and process one batch; an empty report means the queue is empty
    pub async fn run_batch(&self) -> Result<BatchReport> {
        let lease = Duration::seconds(self.settings.lease_secs);
        let jobs = queue::claim_batch(&self.pool, self.settings.claim_size, lease).await?;
        let mut report = BatchReport {
            claimed: jobs.len(),
            ..BatchReport::default()
        };

        for job in &jobs {
            // Earlier jobs in the batch may have eaten into the lease
            if let Err(e) = queue::touch(&self.pool, job.id).await {
                warn!(job_id = job.id, error = %e, "Could not renew job lease");
            }

            match self.process(job, Utc::now()).await {
                Ok(content_id) => match queue::complete(&self.pool, job.id).await {
                    Ok(()) => {
                        info!(
                            job_id = job.id,
                            content_id,
                            language = %job.language,
                            cefr = %job.cefr_level,
                            subject = %job.subject,
                            content_type = %job.content_type,
                            "Generation job done"
                        );
                        report.done += 1;
                    }
                    Err(e) => {
                        error!(job_id = job.id, error = %e, "Could not mark generation job done");
                        report.unrecorded += 1;
                    }
                },
                Err(e) => {
                    let message = e.to_string();
                    error!(job_id = job.id, error = %message, "Generation job failed");
                    match queue::fail(&self.pool, job.id, &message).await {
                        Ok(()) => report.failed += 1,
                        Err(e) => {
                            error!(job_id = job.id, error = %e, "Could not mark generation job failed");
                            report.unrecorded += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Process batches until no pending job is left
    pub async fn run_until_empty(&self) -> Result<BatchReport> {
        let mut total = BatchReport::default();
        loop {
            let report = self.run_batch().await?;
            if report.claimed == 0 {
                return Ok(total);
            }
            total.absorb(report);
        }
    }

    /// Generate, store and index one job; returns the content row id
    async fn process(&self, job: &GenerationJob, now: DateTime<Utc>) -> Result<i64> {
        let spec = JobSpec::try_from(job)?;

        let generator = &self.generator;
        let spec_ref = &spec;
        let content = retry_with_backoff(
            "generate content",
            self.settings.max_attempts,
            self.settings.retry_base_ms,
            || generator.generate(spec_ref),
        )
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        match content {
            GeneratedContent::News(article) => self.store_news(&spec, article, now).await,
            GeneratedContent::Story(story) => self.store_story(&spec, story, now).await,
        }
    }

    async fn store_news(&self, spec: &JobSpec, article: GeneratedArticle, now: DateTime<Utc>) -> Result<i64> {
        let date = now.date_naive();
        let key = content_key(&spec.language, &spec.cefr_level, &spec.subject, ContentType::News, date);

        let body = NewsBody {
            article: article.article,
            dictionary: article.dictionary,
            sources: article.sources,
        };
        self.store.put(&key, to_json(&body)?).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO news (title, language, topic, cefr_level, preview_text, created_at, date_created)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (language, cefr_level, topic, date_created) DO UPDATE SET
                title = excluded.title,
                preview_text = excluded.preview_text,
                created_at = excluded.created_at
            RETURNING id
            "#,
        )
        .bind(&article.title)
        .bind(&spec.language)
        .bind(&spec.subject)
        .bind(&spec.cefr_level)
        .bind(&article.preview_text)
        .bind(now)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn store_story(&self, spec: &JobSpec, story: GeneratedStory, now: DateTime<Utc>) -> Result<i64> {
        if story.pages.is_empty() {
            return Err(Error::InvalidInput("Generated story has no pages".to_string()));
        }
        let date = now.date_naive();

        let key = content_key(&spec.language, &spec.cefr_level, &spec.subject, ContentType::Story, date);
        self.store.put(&key, to_json(&story)?).await?;

        for (index, page) in story.pages.iter().enumerate() {
            let page_number = u32::try_from(index)
                .map_err(|_| Error::InvalidInput(format!("Story page {} out of range", index)))?;
            let page_key = story_page_key(&spec.language, &spec.cefr_level, &spec.subject, date, page_number);
            self.store.put(&page_key, to_json(page)?).await?;
        }

        let pages = i64::try_from(story.pages.len())
            .map_err(|_| Error::InvalidInput("Too many story pages".to_string()))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stories (title, language, topic, cefr_level, preview_text, pages, created_at, date_created)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (language, cefr_level, topic, date_created) DO UPDATE SET
                title = excluded.title,
                preview_text = excluded.preview_text,
                pages = excluded.pages,
                created_at = excluded.created_at
            RETURNING id
            "#,
        )
        .bind(&story.title)
        .bind(&spec.language)
        .bind(&spec.subject)
        .bind(&spec.cefr_level)
        .bind(&story.preview_text)
        .bind(pages)
        .bind(now)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Internal(format!("Failed to encode blob: {}", e)))
}
