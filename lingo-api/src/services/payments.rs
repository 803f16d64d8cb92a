//! Payment provider client
//!
//! Creates hosted checkout sessions and schedules subscription
//! cancellation. Plan changes are never applied here; they arrive later as
//! signed webhook events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{base_url, http_client};
use crate::ApiError;

/// Payment provider errors
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Request never reached the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("Payment provider error {0}: {1}")]
    Api(u16, String),

    /// Provider response could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Subscription checkout to open for a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub price_id: String,
    /// Existing provider customer to attach the subscription to
    pub customer_id: Option<String>,
    /// Echoed back in `checkout.session.completed`
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_period_days: Option<u32>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a checkout session and return the URL to redirect the user to
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError>;

    /// Ask the provider to end the subscription when the paid period runs out
    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct CancelRequest {
    cancel_at_period_end: bool,
}

/// Payment provider reached over HTTP with a bearer API key
pub struct HttpPaymentProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPaymentProvider {
    pub fn new(base: &str, api_key: Option<String>) -> Result<Self, PaymentError> {
        let http_client = http_client().map_err(|e| PaymentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url(base),
            api_key,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api(status.as_u16(), error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        debug!(url = %url, price_id = %request.price_id, "Creating checkout session");

        let response = self
            .authorized(self.http_client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let session: CheckoutSessionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        Ok(session.url)
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        debug!(url = %url, "Scheduling subscription cancellation");

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&CancelRequest {
                cancel_at_period_end: true,
            })
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}
