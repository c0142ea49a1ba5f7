//! Speech-to-text (STT) processing
//!
//! Google Cloud Speech-to-Text `v1/speech:recognize` with an API key. The
//! first alternative of the first result is the transcript.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::is_transient_status;
use crate::core::retry::unavailable;
use crate::core::{retry, AgentError, AgentResult, RetryPolicy};

const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com/v1/speech:recognize";

/// Transcribes a recorded utterance
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe 16-bit mono WAV audio.
    ///
    /// Fails with [`AgentError::RecognitionFailure`] when nothing intelligible
    /// was heard and [`AgentError::ServiceUnavailable`] when the service
    /// cannot be reached.
    async fn transcribe(&self, wav: &[u8], sample_rate: u32) -> AgentResult<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'a str,
    sample_rate_hertz: u32,
    language_code: &'a str,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

/// Google Speech-to-Text client
pub struct GoogleSpeechToText {
    client: reqwest::Client,
    api_key: String,
    language: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl GoogleSpeechToText {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AgentError::MissingCredential(
                "Google Speech API key required for STT".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            language: "en-US".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Set the BCP-47 language code
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn recognize_once(&self, body: &RecognizeRequest<'_>) -> AgentResult<RecognizeResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("[STT] Request failed: {}", e);
                e
            })?;

        let status = response.status();
        tracing::debug!("[STT] Response status: {}", status);

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("[STT] API error {}: {}", status, message);
            return Err(AgentError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Transport failures, timeouts, 429 and 5xx mean the service is unreachable.
/// A rejected key is a configuration problem; other 4xx stay as they are.
fn classify_failure(err: AgentError) -> AgentError {
    match err {
        AgentError::Http(ref e) if !e.is_decode() => unavailable("Google Speech", err),
        AgentError::Remote { status, .. } if is_transient_status(status) => {
            unavailable("Google Speech", err)
        }
        AgentError::Remote {
            status: status @ (401 | 403),
            message,
        } => AgentError::Config(format!(
            "Google Speech rejected the API key ({}): {}",
            status, message
        )),
        other => other,
    }
}

/// First alternative of the first result, if it has any text
fn extract_transcript(response: RecognizeResponse) -> AgentResult<String> {
    response
        .results
        .into_iter()
        .next()
        .and_then(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AgentError::RecognitionFailure("no transcript in response".to_string()))
}

#[async_trait]
impl SpeechToText for GoogleSpeechToText {
    async fn transcribe(&self, wav: &[u8], sample_rate: u32) -> AgentResult<String> {
        tracing::debug!("[STT] Transcribing {} bytes", wav.len());

        let body = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: sample_rate,
                language_code: &self.language,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(wav),
            },
        };

        let response = retry(&self.retry, "speech recognize", || self.recognize_once(&body))
            .await
            .map_err(classify_failure)?;

        let transcript = extract_transcript(response)?;
        tracing::info!("[STT] Transcript: {}", transcript);
        Ok(transcript)
    }
}
