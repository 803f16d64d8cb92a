//! Signed payment webhook tests

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use helpers::{extract_json, setup_app, setup_app_with_webhook_secret, TestApp, WEBHOOK_SECRET};
use lingo_api::webhook::signature::sign;
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// 2099-12-31T00:00:00Z
const PERIOD_END: i64 = 4_102_358_400;

fn event(event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", event_type),
        "type": event_type,
        "data": {"object": object}
    }))
    .unwrap()
}

async fn deliver(app: &TestApp, header: Option<(&str, String)>, payload: Vec<u8>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let request = builder.body(Body::from(payload)).unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    extract_json(response).await
}

async fn deliver_signed(app: &TestApp, payload: Vec<u8>) -> (StatusCode, Value) {
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    deliver(app, Some(("lingo-signature", signature)), payload).await
}

fn premium_checkout(user_id: &str) -> Vec<u8> {
    event(
        "checkout.session.completed",
        json!({
            "customer": format!("cus_{}", user_id),
            "subscription": format!("sub_{}", user_id),
            "product": "Premium",
            "period_end": PERIOD_END,
            "client_reference_id": user_id,
            "payment_status": "paid"
        }),
    )
}

#[tokio::test]
async fn test_subscription_lifecycle() {
    let app = setup_app().await;

    let (status, body) = deliver_signed(&app, premium_checkout("u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "PREMIUM");
    assert_eq!(body["expiration"], "2099-12-31");
    assert_eq!(body["canceled"], false);

    let (status, _) = deliver_signed(
        &app,
        event(
            "customer.subscription.updated",
            json!({"customer": "cus_u1", "cancel_at_period_end": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "PREMIUM");
    assert_eq!(body["canceled"], true);

    let (status, _) = deliver_signed(
        &app,
        event("invoice.payment_failed", json!({"customer": "cus_u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "FREE");
    assert!(body["expiration"].is_null());
    assert_eq!(body["canceled"], false);

    let subscription: Option<String> =
        sqlx::query_scalar("SELECT subscription_id FROM billing_accounts WHERE user_id = 'u1'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(subscription, None);

    // Renewal finds the account by the customer id kept on downgrade
    let (status, _) = deliver_signed(
        &app,
        event(
            "invoice.paid",
            json!({
                "customer": "cus_u1",
                "subscription": "sub_u1b",
                "product": "Standard",
                "period_end": PERIOD_END
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "STANDARD");
}

#[tokio::test]
async fn test_replayed_event_leaves_same_state() {
    let app = setup_app().await;

    deliver_signed(&app, premium_checkout("u1")).await;
    let (_, first) = app.get("/billing", "u1").await;
    deliver_signed(&app, premium_checkout("u1")).await;
    let (_, second) = app.get("/billing", "u1").await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_organization_checkout() {
    let app = setup_app().await;
    let (_, body) = app.post("/organization/create", "admin", json!({})).await;
    let organization_id = body["organization_id"].as_str().unwrap().to_string();

    let payload = event(
        "checkout.session.completed",
        json!({
            "customer": "cus_org",
            "subscription": "sub_org",
            "product": "Classroom",
            "period_end": PERIOD_END,
            "client_reference_id": "admin",
            "payment_status": "paid"
        }),
    );
    let (status, _) = deliver_signed(&app, payload).await;
    assert_eq!(status, StatusCode::OK);

    let (plan, subscription): (String, Option<String>) =
        sqlx::query_as("SELECT plan, subscription_id FROM organizations WHERE id = ?")
            .bind(&organization_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(plan, "CLASSROOM");
    assert_eq!(subscription.as_deref(), Some("sub_org"));

    let (_, body) = app.get("/organization/plan", "admin").await;
    assert_eq!(body["plan"], "CLASSROOM");

    let (status, _) = deliver_signed(
        &app,
        event("customer.subscription.deleted", json!({"customer": "cus_org"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/organization/plan", "admin").await;
    assert_eq!(body["plan"], "FREE");
}

#[tokio::test]
async fn test_unpaid_checkout_and_unknown_customers_are_acknowledged() {
    let app = setup_app().await;

    let unpaid = event(
        "checkout.session.completed",
        json!({
            "customer": "cus_u1",
            "product": "Premium",
            "client_reference_id": "u1",
            "payment_status": "unpaid"
        }),
    );
    let (status, _) = deliver_signed(&app, unpaid).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "FREE");

    let (status, body) = deliver_signed(
        &app,
        event("invoice.paid", json!({"customer": "cus_nobody", "product": "Premium"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (status, _) = deliver_signed(&app, event("charge.refunded", json!({"amount": 100}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signature_is_required() {
    let app = setup_app().await;
    let payload = premium_checkout("u1");

    let (status, body) = deliver(&app, None, payload.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Missing signature header");

    let forged = sign(&payload, "whsec_wrong", Utc::now().timestamp());
    let (status, body) = deliver(&app, Some(("lingo-signature", forged)), payload.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid signature");

    let stale = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp() - 3600);
    let (status, _) = deliver(&app, Some(("lingo-signature", stale)), payload.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/billing", "u1").await;
    assert_eq!(body["plan"], "FREE");

    // The provider's own header name is accepted too
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    let (status, _) = deliver(&app, Some(("stripe-signature", signature)), payload).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_secret_refuses_webhooks() {
    let app = setup_app_with_webhook_secret(None).await;
    let payload = premium_checkout("u1");
    let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, body) = deliver(&app, Some(("lingo-signature", signature)), payload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let app = setup_app().await;
    let payload = b"{not json".to_vec();

    let (status, _) = deliver_signed(&app, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_logged_and_acknowledged() {
    let app = setup_app().await;
    app.set_user_plan("u1", "PREMIUM", Some("sub_u1")).await;
    sqlx::query("DROP TABLE billing_accounts")
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) = deliver_signed(
        &app,
        event("invoice.payment_failed", json!({"customer": "cus_u1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}
