//! Payment provider event payloads
//!
//! Envelope: `{"id": "...", "type": "...", "data": {"object": {...}}}`.
//! Only the fields the billing state machine reads are decoded.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// A completed hosted checkout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub period_end: Option<i64>,
    /// User id supplied when the session was created
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

/// Invoice paid or failed for a subscription period
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invoice {
    pub customer: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub customer: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

/// Events the billing state machine reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CheckoutCompleted(CheckoutSession),
    InvoicePaid(Invoice),
    PaymentFailed(Invoice),
    SubscriptionUpdated(Subscription),
    SubscriptionDeleted(Subscription),
    /// Any other event type; acknowledged without effect
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub kind: EventKind,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        let object = envelope.data.object;

        let kind = match envelope.event_type.as_str() {
            "checkout.session.completed" => {
                EventKind::CheckoutCompleted(serde_json::from_value(object)?)
            }
            "invoice.paid" | "invoice.payment_succeeded" => {
                EventKind::InvoicePaid(serde_json::from_value(object)?)
            }
            "invoice.payment_failed" => EventKind::PaymentFailed(serde_json::from_value(object)?),
            "customer.subscription.updated" => {
                EventKind::SubscriptionUpdated(serde_json::from_value(object)?)
            }
            "customer.subscription.deleted" => {
                EventKind::SubscriptionDeleted(serde_json::from_value(object)?)
            }
            _ => EventKind::Ignored,
        };

        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            kind,
        })
    }
}

/// Calendar date (UTC) of a unix timestamp
pub fn period_end_date(period_end: Option<i64>) -> Option<NaiveDate> {
    period_end
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "customer": "cus_1",
                "subscription": "sub_1",
                "product": "Premium",
                "period_end": 1735603200,
                "client_reference_id": "user-1",
                "payment_status": "paid"
            }}
        }"#;

        let event = WebhookEvent::parse(payload).unwrap();
        match event.kind {
            EventKind::CheckoutCompleted(session) => {
                assert!(session.is_paid());
                assert_eq!(session.client_reference_id.as_deref(), Some("user-1"));
                assert_eq!(
                    period_end_date(session.period_end),
                    NaiveDate::from_ymd_opt(2024, 12, 31)
                );
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_invoice_aliases() {
        for event_type in ["invoice.paid", "invoice.payment_succeeded"] {
            let payload = format!(
                r#"{{"id":"evt","type":"{}","data":{{"object":{{"customer":"cus_1"}}}}}}"#,
                event_type
            );
            let event = WebhookEvent::parse(payload.as_bytes()).unwrap();
            assert!(matches!(event.kind, EventKind::InvoicePaid(_)));
        }
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let payload = br#"{"id":"evt","type":"charge.refunded","data":{"object":{"anything":1}}}"#;
        assert_eq!(WebhookEvent::parse(payload).unwrap().kind, EventKind::Ignored);
    }

    #[test]
    fn test_missing_customer_is_an_error() {
        let payload = br#"{"id":"evt","type":"invoice.payment_failed","data":{"object":{}}}"#;
        assert!(WebhookEvent::parse(payload).is_err());
    }
}
