//! Text-to-speech (TTS) processing
//!
//! Gemini speech generation: the `generateContent` API with an `AUDIO`
//! response modality returns base64 16-bit little-endian PCM, which is
//! wrapped in a WAV container here.

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::time::Duration;

use crate::core::{retry, AgentError, AgentResult, RetryPolicy};
use crate::llm::gemini::{post_generate, GeminiContent, GeminiPart, DEFAULT_API_BASE};

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Callirhoe";

/// Delivery instructions prepended to the text
pub const DEFAULT_STYLE: &str =
    "You are having a casual conversation with a friend. Say the following in a friendly and amused way:";

/// PCM rate Gemini uses when the mime type does not say
const DEFAULT_PCM_RATE: u32 = 24000;

/// Synthesizes speech from text
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` and return WAV bytes
    async fn synthesize(&self, text: &str) -> AgentResult<Vec<u8>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TtsRequest {
    contents: Vec<GeminiContent>,
    generation_config: TtsGenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TtsGenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

/// Gemini TTS client
pub struct GeminiTextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    style: String,
    api_base: String,
    retry: RetryPolicy,
}

impl GeminiTextToSpeech {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AgentResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AgentError::MissingCredential(
                "Gemini API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key,
            model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            style: DEFAULT_STYLE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(&self, text: &str) -> TtsRequest {
        let prompt = if self.style.is_empty() {
            text.to_string()
        } else {
            format!("{}\n{}", self.style, text)
        };

        TtsRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::text(prompt)],
            }],
            generation_config: TtsGenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                },
            },
        }
    }
}

/// Read `rate=NNNN` from a mime type such as `audio/L16;codec=pcm;rate=24000`
fn pcm_rate(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
        .unwrap_or(DEFAULT_PCM_RATE)
}

/// Wrap 16-bit little-endian mono PCM in a WAV container
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> AgentResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AgentError::SynthesisFailure(e.to_string()))?;
        for frame in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                .map_err(|e| AgentError::SynthesisFailure(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AgentError::SynthesisFailure(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[async_trait]
impl TextToSpeech for GeminiTextToSpeech {
    async fn synthesize(&self, text: &str) -> AgentResult<Vec<u8>> {
        tracing::debug!("[TTS] Synthesizing {} chars with voice {}", text.len(), self.voice);

        let request = self.build_request(text);
        let response = retry(&self.retry, "gemini tts", || {
            post_generate(&self.client, &self.api_base, &self.model, &self.api_key, &request)
        })
        .await?;

        let inline = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .ok_or_else(|| AgentError::SynthesisFailure("response contained no audio".to_string()))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| AgentError::SynthesisFailure(format!("invalid audio payload: {}", e)))?;

        if audio.is_empty() {
            return Err(AgentError::SynthesisFailure("empty audio payload".to_string()));
        }

        tracing::debug!("[TTS] Received {} bytes of {}", audio.len(), inline.mime_type);

        if inline.mime_type.contains("wav") {
            return Ok(audio);
        }
        pcm_to_wav(&audio, pcm_rate(&inline.mime_type))
    }
}
