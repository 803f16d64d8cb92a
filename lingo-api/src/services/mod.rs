//! Clients for third-party services
//!
//! Each service sits behind a trait so handlers can be driven with fakes in
//! tests. The HTTP implementations share the same client settings.

pub mod payments;
pub mod speech;

pub use payments::{CheckoutRequest, HttpPaymentProvider, PaymentError, PaymentProvider};
pub use speech::{
    HttpSpeechService, SpeechError, SpeechService, SynthesisRequest, TranscriptionRequest,
};

use std::time::Duration;

const USER_AGENT: &str = concat!("lingo-api/", env!("CARGO_PKG_VERSION"));

/// Upper bound on any single outbound request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
}

/// Trim a trailing slash so paths can be appended with `format!`
pub(crate) fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
