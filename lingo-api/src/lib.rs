//! lingo-api library - language learning platform HTTP service
//!
//! Serves decks, classrooms, organizations, billing, learner progress and
//! generated reading content. Every route except `/health` and `/webhook`
//! requires a bearer token.

use axum::Router;
use lingo_common::config::{PaymentsConfig, ServiceConfig};
use lingo_common::storage::ObjectStore;
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod access;
pub mod api;
pub mod auth;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod pagination;
pub mod roles;
pub mod services;
pub mod webhook;

pub use error::{ApiError, ApiResult};

use auth::JwtVerifier;
use services::{PaymentProvider, SpeechService};

/// Webhook verification settings
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// None leaves the endpoint answering 500
    pub secret: Option<String>,
    pub tolerance_secs: i64,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bearer token verifier
    pub auth: Arc<JwtVerifier>,
    pub webhook: WebhookSettings,
    /// Price ids and return URLs for checkout sessions
    pub payments_config: Arc<PaymentsConfig>,
    pub payments: Arc<dyn PaymentProvider>,
    pub speech: Arc<dyn SpeechService>,
    /// Generated article, story and audio blobs
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Create application state; fails when no JWT secret is configured
    pub fn new(
        db: SqlitePool,
        config: &ServiceConfig,
        payments: Arc<dyn PaymentProvider>,
        speech: Arc<dyn SpeechService>,
        store: Arc<dyn ObjectStore>,
    ) -> lingo_common::Result<Self> {
        let secret = config.require_jwt_secret()?;

        Ok(Self {
            db,
            auth: Arc::new(JwtVerifier::new(secret)),
            webhook: WebhookSettings {
                secret: config.webhook_secret.clone(),
                tolerance_secs: config.webhook_tolerance_secs,
            },
            payments_config: Arc::new(config.payments.clone()),
            payments,
            speech,
            store,
        })
    }
}

/// Build application router
///
/// Health and the payment webhook are public; the webhook authenticates by
/// signature instead of bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    // Protected routes (require authentication)
    let protected = Router::new()
        .merge(api::deck_routes())
        .merge(api::teacher_routes())
        .merge(api::student_routes())
        .merge(api::organization_routes())
        .merge(api::billing_routes())
        .merge(api::content_routes())
        .merge(api::audio_routes())
        .merge(api::profile_routes())
        .merge(api::progress_routes())
        .merge(api::stats_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .merge(api::health_routes())
        .merge(webhook::webhook_routes());

    // Combine routers
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
