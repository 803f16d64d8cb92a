//! Billing and subscription state machine driven by payment webhooks
//!
//! Every transition overwrites the stored state, so replaying an event
//! leaves the account unchanged. Events for customers this service does not
//! know, and events whose account lookup or write fails, are logged and
//! acknowledged; the provider never retries them.

pub mod events;
pub mod signature;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use lingo_common::PlanTier;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::billing::{self, BillingState};
use crate::db::{membership, organizations};
use crate::{ApiError, ApiResult, AppState};
use events::{period_end_date, CheckoutSession, EventKind, Invoice, Subscription, WebhookEvent};

/// Account a provider customer id belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
enum BillingTarget {
    Organization(String),
    User(String),
}

/// Organizations are matched first, then individual accounts
async fn find_target(pool: &SqlitePool, customer_id: &str) -> ApiResult<Option<BillingTarget>> {
    if let Some(organization) = organizations::get_organization_by_customer(pool, customer_id).await? {
        return Ok(Some(BillingTarget::Organization(organization.id)));
    }
    Ok(billing::user_id_by_customer(pool, customer_id)
        .await?
        .map(BillingTarget::User))
}

async fn write_state(pool: &SqlitePool, target: &BillingTarget, state: &BillingState) -> ApiResult<()> {
    match target {
        BillingTarget::Organization(id) => {
            organizations::update_organization_billing(pool, id, state).await?
        }
        BillingTarget::User(id) => billing::update_billing_account(pool, id, state).await?,
    }
    Ok(())
}

/// Apply one verified event to the stored billing state
pub async fn apply_event(pool: &SqlitePool, event: &WebhookEvent) -> ApiResult<()> {
    match &event.kind {
        EventKind::CheckoutCompleted(session) => checkout_completed(pool, session).await,
        EventKind::InvoicePaid(invoice) => invoice_paid(pool, invoice).await,
        EventKind::PaymentFailed(invoice) => downgrade(pool, &invoice.customer).await,
        EventKind::SubscriptionUpdated(subscription) => {
            subscription_updated(pool, subscription).await
        }
        EventKind::SubscriptionDeleted(subscription) => {
            downgrade(pool, &subscription.customer).await
        }
        EventKind::Ignored => {
            debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            Ok(())
        }
    }
}

async fn checkout_completed(pool: &SqlitePool, session: &CheckoutSession) -> ApiResult<()> {
    if !session.is_paid() {
        debug!("Ignoring unpaid checkout session");
        return Ok(());
    }

    let Some(user_id) = session.client_reference_id.as_deref() else {
        warn!("Checkout session without client reference id");
        return Ok(());
    };

    let plan = PlanTier::from_product_name(session.product.as_deref().unwrap_or_default());
    let state = BillingState {
        plan,
        customer_id: session.customer.clone().unwrap_or_default(),
        subscription_id: session.subscription.clone().unwrap_or_default(),
        expiration: period_end_date(session.period_end),
        canceled: false,
    };

    let target = match plan {
        PlanTier::Premium | PlanTier::Standard => {
            // Make sure the account row exists before overwriting it
            billing::get_billing_account(pool, user_id).await?;
            BillingTarget::User(user_id.to_string())
        }
        _ => match membership::find_admin_organization_id(pool, user_id).await? {
            Some(organization_id) => BillingTarget::Organization(organization_id),
            None => {
                warn!(user_id, "Organization checkout by a user who administers no organization");
                return Ok(());
            }
        },
    };

    write_state(pool, &target, &state).await?;
    info!(?target, plan = %plan, "Checkout completed");
    Ok(())
}

async fn invoice_paid(pool: &SqlitePool, invoice: &Invoice) -> ApiResult<()> {
    let Some(target) = find_target(pool, &invoice.customer).await? else {
        warn!(customer_id = %invoice.customer, "Invoice paid for unknown customer");
        return Ok(());
    };

    let plan = PlanTier::from_product_name(invoice.product.as_deref().unwrap_or_default());
    let state = BillingState {
        plan,
        customer_id: invoice.customer.clone(),
        subscription_id: invoice.subscription.clone().unwrap_or_default(),
        expiration: period_end_date(invoice.period_end),
        canceled: false,
    };

    write_state(pool, &target, &state).await?;
    info!(?target, plan = %plan, "Subscription renewed");
    Ok(())
}

async fn subscription_updated(pool: &SqlitePool, subscription: &Subscription) -> ApiResult<()> {
    let canceled = subscription.cancel_at_period_end;
    match find_target(pool, &subscription.customer).await? {
        Some(BillingTarget::Organization(id)) => {
            organizations::set_organization_canceled(pool, &id, canceled).await?
        }
        Some(BillingTarget::User(id)) => billing::set_billing_canceled(pool, &id, canceled).await?,
        None => {
            warn!(customer_id = %subscription.customer, "Subscription update for unknown customer");
            return Ok(());
        }
    }
    info!(customer_id = %subscription.customer, canceled, "Subscription updated");
    Ok(())
}

/// Back to FREE with no subscription or expiration, whatever the prior plan
async fn downgrade(pool: &SqlitePool, customer_id: &str) -> ApiResult<()> {
    let Some(target) = find_target(pool, customer_id).await? else {
        warn!(customer_id, "Downgrade for unknown customer");
        return Ok(());
    };

    write_state(pool, &target, &BillingState::downgraded(customer_id)).await?;
    info!(?target, "Downgraded to FREE");
    Ok(())
}

// ========================================
// HTTP endpoint
// ========================================

/// POST /webhook
///
/// Verifies the signature against the raw body before decoding it. Once the
/// event is verified the answer is always 200.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .webhook
        .secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Webhook secret not configured".to_string()))?;

    let header = headers
        .get(signature::SIGNATURE_HEADER)
        .or_else(|| headers.get(signature::ALTERNATE_SIGNATURE_HEADER))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature header".to_string()))?;

    signature::verify(
        header,
        &body,
        secret,
        state.webhook.tolerance_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!("Rejected webhook: {}", e);
        ApiError::BadRequest("Invalid signature".to_string())
    })?;

    let event = WebhookEvent::parse(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    debug!(event_id = %event.id, event_type = %event.event_type, "Webhook received");
    if let Err(e) = apply_event(&state.db, &event).await {
        warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            error = %e,
            "Webhook event not applied"
        );
    }

    Ok(Json(json!({ "received": true })))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        lingo_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    fn event(kind: EventKind) -> WebhookEvent {
        WebhookEvent {
            id: "evt_test".to_string(),
            event_type: "test".to_string(),
            kind,
        }
    }

    fn paid_checkout(user_id: &str, product: &str, customer: &str) -> EventKind {
        EventKind::CheckoutCompleted(CheckoutSession {
            customer: Some(customer.to_string()),
            subscription: Some(format!("sub_{}", customer)),
            product: Some(product.to_string()),
            period_end: Some(1_735_603_200),
            client_reference_id: Some(user_id.to_string()),
            payment_status: Some("paid".to_string()),
        })
    }

    #[tokio::test]
    async fn test_checkout_premium_upgrades_individual() {
        let pool = setup_db().await;

        apply_event(&pool, &event(paid_checkout("u1", "Premium", "cus_1")))
            .await
            .unwrap();

        let account = billing::get_billing_account(&pool, "u1").await.unwrap();
        assert_eq!(account.plan, "PREMIUM");
        assert_eq!(account.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(account.expiration, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert!(!account.canceled);
    }

    #[tokio::test]
    async fn test_unpaid_checkout_is_ignored() {
        let pool = setup_db().await;
        let mut kind = paid_checkout("u1", "Premium", "cus_1");
        if let EventKind::CheckoutCompleted(session) = &mut kind {
            session.payment_status = Some("unpaid".to_string());
        }

        apply_event(&pool, &event(kind)).await.unwrap();

        let account = billing::get_billing_account(&pool, "u1").await.unwrap();
        assert_eq!(account.plan, "FREE");
    }

    #[tokio::test]
    async fn test_checkout_other_product_upgrades_admins_organization() {
        let pool = setup_db().await;
        let (organization, _) = organizations::create_organization(&pool, "admin")
            .await
            .unwrap();

        apply_event(&pool, &event(paid_checkout("admin", "School Plan", "cus_org")))
            .await
            .unwrap();

        let found = organizations::get_organization(&pool, &organization.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.plan, "CLASSROOM");
        assert_eq!(found.customer_id.as_deref(), Some("cus_org"));
    }

    #[tokio::test]
    async fn test_organization_checkout_without_organization_is_noop() {
        let pool = setup_db().await;

        apply_event(&pool, &event(paid_checkout("nobody", "School Plan", "cus_x")))
            .await
            .unwrap();

        assert!(organizations::get_organization_by_customer(&pool, "cus_x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_payment_failed_downgrades_to_free() {
        let pool = setup_db().await;
        apply_event(&pool, &event(paid_checkout("u1", "Standard", "cus_1")))
            .await
            .unwrap();

        let failed = event(EventKind::PaymentFailed(Invoice {
            customer: "cus_1".to_string(),
            subscription: Some("sub_cus_1".to_string()),
            product: None,
            period_end: None,
        }));
        apply_event(&pool, &failed).await.unwrap();
        // Replaying the event changes nothing
        apply_event(&pool, &failed).await.unwrap();

        let account = billing::get_billing_account(&pool, "u1").await.unwrap();
        assert_eq!(account.plan, "FREE");
        assert_eq!(account.subscription_id, None);
        assert_eq!(account.expiration, None);
        assert!(!account.canceled);
        assert_eq!(account.customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn test_subscription_updated_mirrors_cancel_flag() {
        let pool = setup_db().await;
        apply_event(&pool, &event(paid_checkout("u1", "Premium", "cus_1")))
            .await
            .unwrap();

        apply_event(
            &pool,
            &event(EventKind::SubscriptionUpdated(Subscription {
                customer: "cus_1".to_string(),
                cancel_at_period_end: true,
            })),
        )
        .await
        .unwrap();

        let account = billing::get_billing_account(&pool, "u1").await.unwrap();
        assert!(account.canceled);
        assert_eq!(account.plan, "PREMIUM");
    }

    #[tokio::test]
    async fn test_invoice_paid_prefers_organization_and_renews() {
        let pool = setup_db().await;
        let (organization, _) = organizations::create_organization(&pool, "admin")
            .await
            .unwrap();
        apply_event(&pool, &event(paid_checkout("admin", "Classroom", "cus_org")))
            .await
            .unwrap();
        organizations::set_organization_canceled(&pool, &organization.id, true)
            .await
            .unwrap();

        apply_event(
            &pool,
            &event(EventKind::InvoicePaid(Invoice {
                customer: "cus_org".to_string(),
                subscription: Some("sub_2".to_string()),
                product: Some("Classroom".to_string()),
                period_end: Some(1_767_139_200),
            })),
        )
        .await
        .unwrap();

        let found = organizations::get_organization(&pool, &organization.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.plan, "CLASSROOM");
        assert!(!found.canceled);
        assert_eq!(found.subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(found.expiration, NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[tokio::test]
    async fn test_unknown_customer_is_acknowledged() {
        let pool = setup_db().await;

        let result = apply_event(
            &pool,
            &event(EventKind::SubscriptionDeleted(Subscription {
                customer: "cus_ghost".to_string(),
                cancel_at_period_end: false,
            })),
        )
        .await;

        assert!(result.is_ok());
    }
}
