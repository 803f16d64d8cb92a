//! Generation job queue backed by the `generation_jobs` table
//!
//! Jobs move `pending` → `running` → `done` | `failed`. Claiming a batch is
//! a single UPDATE, so two workers never pick up the same job. A `running`
//! job whose lease ran out (its worker died or lost the database) is handed
//! out again.

use chrono::{Duration, Utc};
use lingo_common::db::models::{ContentType, GenerationJob, CEFR_LEVELS};
use lingo_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Most jobs inserted per transaction
pub const ENQUEUE_BATCH_SIZE: usize = 10;

/// Default number of jobs a worker claims at once
pub const DEFAULT_CLAIM_SIZE: i64 = 10;

/// How long a claimed job stays reserved before another claim may take it
pub const DEFAULT_LEASE_SECS: i64 = 900;

/// One piece of content to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub language: String,
    pub cefr_level: String,
    pub subject: String,
    pub content_type: ContentType,
}

impl TryFrom<&GenerationJob> for JobSpec {
    type Error = Error;

    fn try_from(job: &GenerationJob) -> Result<Self> {
        Ok(Self {
            language: job.language.clone(),
            cefr_level: job.cefr_level.clone(),
            subject: job.subject.clone(),
            content_type: job.content_type.parse()?,
        })
    }
}

/// Every language × CEFR level × subject × content type combination
pub fn fan_out(languages: &[String], subjects: &[String], content_types: &[ContentType]) -> Vec<JobSpec> {
    let mut specs = Vec::with_capacity(
        languages.len() * CEFR_LEVELS.len() * subjects.len() * content_types.len(),
    );

    for language in languages {
        for cefr_level in CEFR_LEVELS {
            for subject in subjects {
                for content_type in content_types {
                    specs.push(JobSpec {
                        language: language.clone(),
                        cefr_level: cefr_level.to_string(),
                        subject: subject.clone(),
                        content_type: *content_type,
                    });
                }
            }
        }
    }

    specs
}

/// Insert `specs` as pending jobs, [`ENQUEUE_BATCH_SIZE`] per transaction.
/// Returns the number of jobs enqueued.
pub async fn enqueue(pool: &SqlitePool, specs: &[JobSpec]) -> Result<usize> {
    let mut enqueued = 0;

    for batch in specs.chunks(ENQUEUE_BATCH_SIZE) {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        for spec in batch {
            sqlx::query(
                r#"
                INSERT INTO generation_jobs
                    (language, cefr_level, subject, content_type, status, attempts, created_at, updated_at)
                VALUES (?, ?, ?, ?, 'pending', 0, ?, ?)
                "#,
            )
            .bind(&spec.language)
            .bind(&spec.cefr_level)
            .bind(&spec.subject)
            .bind(spec.content_type.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        enqueued += batch.len();
        debug!(batch = batch.len(), "Enqueued generation batch");
    }

    info!(enqueued, "Generation jobs enqueued");
    Ok(enqueued)
}

/// Mark up to `limit` of the oldest claimable jobs as running and return
/// them oldest first.
///
/// Claimable means pending, or running with no status change for `lease`.
pub async fn claim_batch(pool: &SqlitePool, limit: i64, lease: Duration) -> Result<Vec<GenerationJob>> {
    if limit < 1 {
        return Err(Error::InvalidInput(format!(
            "Claim size must be at least 1, got {}",
            limit
        )));
    }

    let now = Utc::now();
    let stale_before = now - lease;

    let mut jobs = sqlx::query_as::<_, GenerationJob>(
        r#"
        UPDATE generation_jobs
        SET status = 'running', attempts = attempts + 1, updated_at = ?
        WHERE id IN (
            SELECT id FROM generation_jobs
            WHERE status = 'pending'
               OR (status = 'running' AND updated_at < ?)
            ORDER BY id
            LIMIT ?
        )
        RETURNING id, language, cefr_level, subject, content_type, status, attempts, last_error
        "#,
    )
    .bind(now)
    .bind(stale_before)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    jobs.sort_by_key(|job| job.id);
    if jobs.iter().any(|job| job.attempts > 1) {
        debug!(claimed = jobs.len(), "Claimed batch includes reclaimed jobs");
    }
    Ok(jobs)
}

/// Renew the lease of a running job
pub async fn touch(pool: &SqlitePool, job_id: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE generation_jobs SET updated_at = ? WHERE id = ? AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Running generation job {}", job_id)));
    }
    Ok(())
}

pub async fn complete(pool: &SqlitePool, job_id: i64) -> Result<()> {
    set_status(pool, job_id, "done", None).await
}

pub async fn fail(pool: &SqlitePool, job_id: i64, error: &str) -> Result<()> {
    set_status(pool, job_id, "failed", Some(error)).await
}

async fn set_status(pool: &SqlitePool, job_id: i64, status: &str, error: Option<&str>) -> Result<()> {
    let result = sqlx::query(
        "UPDATE generation_jobs SET status = ?, last_error = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status)
    .bind(error)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Generation job {}", job_id)));
    }
    Ok(())
}

/// Jobs in each status, for progress logging
pub async fn status_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let counts = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM generation_jobs GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(counts)
}
