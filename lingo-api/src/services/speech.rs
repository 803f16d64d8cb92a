//! Translation, text-to-speech and speech-to-text client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{base_url, http_client};
use crate::ApiError;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Speech provider error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Recognition finished without any transcript
    #[error("No transcript produced")]
    NoTranscript,
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NoTranscript => ApiError::NoTranscript,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub language_code: String,
    pub voice_name: String,
    /// Natural (neural) voice instead of the standard one
    #[serde(default)]
    pub natural: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    /// Base64 encoded audio
    pub audio_content: String,
    pub language_code: String,
    /// Premium recognition model
    #[serde(default)]
    pub premium: bool,
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn translate(&self, sentence: &str, source: &str, target: &str) -> Result<String, SpeechError>;

    /// Returns base64 encoded audio
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SpeechError>;

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, SpeechError>;
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    sentence: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateReply {
    sentence: String,
}

#[derive(Deserialize)]
struct SynthesisReply {
    audio_content: String,
}

#[derive(Deserialize)]
struct TranscriptionReply {
    #[serde(default)]
    transcript: Option<String>,
}

pub struct HttpSpeechService {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSpeechService {
    pub fn new(base: &str, api_key: Option<String>) -> Result<Self, SpeechError> {
        let http_client = http_client().map_err(|e| SpeechError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url(base),
            api_key,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SpeechError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de> + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling speech provider");

        let mut builder = self.http_client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| SpeechError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn translate(&self, sentence: &str, source: &str, target: &str) -> Result<String, SpeechError> {
        let reply: TranslateReply = self
            .post(
                "/translate",
                &TranslateBody {
                    sentence,
                    source,
                    target,
                },
            )
            .await?;
        Ok(reply.sentence)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SpeechError> {
        let reply: SynthesisReply = self.post("/tts", request).await?;
        Ok(reply.audio_content)
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String, SpeechError> {
        let reply: TranscriptionReply = self.post("/stt", request).await?;
        transcript_or_error(reply.transcript)
    }
}

/// An absent or blank transcript is [`SpeechError::NoTranscript`]
fn transcript_or_error(transcript: Option<String>) -> Result<String, SpeechError> {
    match transcript {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(SpeechError::NoTranscript),
    }
}
