//! Shared setup for lingo-api integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use lingo_api::auth::{Claims, JwtVerifier};
use lingo_api::services::{
    CheckoutRequest, PaymentError, PaymentProvider, SpeechError, SpeechService, SynthesisRequest,
    TranscriptionRequest,
};
use lingo_api::{build_router, AppState, WebhookSettings};
use lingo_common::config::PaymentsConfig;
use lingo_common::storage::{FsObjectStore, ObjectStore};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

// ========================================
// Fakes
// ========================================

/// Records every call and answers with canned URLs
#[derive(Default)]
pub struct FakePayments {
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    pub cancels: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        Ok(format!("https://pay.test/session/{}", checkouts.len()))
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.cancels.lock().unwrap().push(subscription_id.to_string());
        Ok(())
    }
}

/// Deterministic speech provider; empty audio yields no transcript
#[derive(Default)]
pub struct FakeSpeech {
    pub synthesized: Mutex<Vec<SynthesisRequest>>,
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn translate(&self, sentence: &str, _source: &str, target: &str) -> Result<String, SpeechError> {
        Ok(format!("[{}] {}", target, sentence))
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SpeechError> {
        self.synthesized.lock().unwrap().push(request.clone());
        Ok("UklGRg==".to_string())
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, SpeechError> {
        if request.audio_content.is_empty() {
            return Err(SpeechError::NoTranscript);
        }
        Ok("bonjour".to_string())
    }
}

// ========================================
// App
// ========================================

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub payments: Arc<FakePayments>,
    pub speech: Arc<FakeSpeech>,
    pub store: Arc<FsObjectStore>,
    /// Keeps the object store directory alive
    _storage: TempDir,
}

pub async fn setup_app() -> TestApp {
    setup_app_with_webhook_secret(Some(WEBHOOK_SECRET)).await
}

pub async fn setup_app_with_webhook_secret(secret: Option<&str>) -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    lingo_common::db::create_schema(&pool).await.unwrap();

    let storage = tempfile::tempdir().unwrap();
    let store = Arc::new(FsObjectStore::new(storage.path()));
    let payments = Arc::new(FakePayments::default());
    let speech = Arc::new(FakeSpeech::default());

    let state = AppState {
        db: pool.clone(),
        auth: Arc::new(JwtVerifier::new(JWT_SECRET)),
        webhook: WebhookSettings {
            secret: secret.map(str::to_string),
            tolerance_secs: 300,
        },
        payments_config: Arc::new(PaymentsConfig {
            base_url: "http://payments.invalid".to_string(),
            api_key: None,
            individual_price_id: "price_individual".to_string(),
            organization_price_id: "price_org".to_string(),
            app_domain: "https://app.test".to_string(),
            dashboard_domain: "https://dashboard.test".to_string(),
        }),
        payments: payments.clone(),
        speech: speech.clone(),
        store: store.clone(),
    };

    TestApp {
        router: build_router(state),
        pool,
        payments,
        speech,
        store,
        _storage: storage,
    }
}

pub fn token_for(user_id: &str) -> String {
    let exp = (Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

impl TestApp {
    /// Send a request as `user` (None = unauthenticated) and decode the
    /// JSON reply; empty bodies decode to `Value::Null`
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", token_for(user)));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        extract_json(response).await
    }

    pub async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(user), Some(body)).await
    }

    /// Insert a news row dated 2025-01-<day> and return its id
    pub async fn insert_news(&self, language: &str, cefr: &str, topic: &str, day: u32) -> i64 {
        let created = Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap();
        sqlx::query(
            r#"
            INSERT INTO news (title, language, topic, cefr_level, preview_text, created_at, date_created)
            VALUES (?, ?, ?, ?, 'preview', ?, ?)
            "#,
        )
        .bind(format!("{} news {}", language, day))
        .bind(language)
        .bind(topic)
        .bind(cefr)
        .bind(created)
        .bind(created.date_naive())
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn insert_story(&self, language: &str, cefr: &str, topic: &str, pages: i64) -> i64 {
        let created = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        sqlx::query(
            r#"
            INSERT INTO stories (title, language, topic, cefr_level, preview_text, pages, created_at, date_created)
            VALUES (?, ?, ?, ?, 'preview', ?, ?, ?)
            "#,
        )
        .bind(format!("{} story", language))
        .bind(language)
        .bind(topic)
        .bind(cefr)
        .bind(pages)
        .bind(created)
        .bind(created.date_naive())
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn insert_audiobook(&self, content_type: &str, content_id: i64, tier: &str, pages: i64) {
        sqlx::query("INSERT INTO audiobooks (content_type, content_id, tier, pages) VALUES (?, ?, ?, ?)")
            .bind(content_type)
            .bind(content_id)
            .bind(tier)
            .bind(pages)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn put_blob(&self, key: &str, body: &Value) {
        self.store
            .put(key, serde_json::to_vec(body).unwrap())
            .await
            .unwrap();
    }

    /// Set an individual account's plan directly
    pub async fn set_user_plan(&self, user_id: &str, plan: &str, subscription_id: Option<&str>) {
        sqlx::query(
            r#"
            INSERT INTO billing_accounts (user_id, plan, expiration, canceled, customer_id, subscription_id)
            VALUES (?, ?, ?, 0, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                expiration = excluded.expiration,
                customer_id = excluded.customer_id,
                subscription_id = excluded.subscription_id
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(NaiveDate::from_ymd_opt(2099, 12, 31))
        .bind(format!("cus_{}", user_id))
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}

pub async fn extract_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
