//! Input channels: where user utterances come from

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::calibration::{capture_utterance, ListenSettings};
use super::capture::{samples_to_wav, MicrophoneSource, SAMPLE_RATE};
use super::stt::SpeechToText;
use crate::cli::Console;
use crate::core::{AgentError, AgentResult};

/// Produces the next user utterance as text
#[async_trait]
pub trait InputChannel: Send + Sync {
    /// Wait for the next utterance.
    ///
    /// [`AgentError::RecognitionFailure`] and [`AgentError::ServiceUnavailable`]
    /// are expected outcomes; the caller simply listens again.
    async fn listen(&self) -> AgentResult<String>;
}

/// Microphone capture followed by remote speech recognition
pub struct MicrophoneInput {
    stt: Arc<dyn SpeechToText>,
    settings: ListenSettings,
    stop: Arc<AtomicBool>,
    console: Console,
}

impl MicrophoneInput {
    pub fn new(stt: Arc<dyn SpeechToText>, stop: Arc<AtomicBool>) -> Self {
        Self {
            stt,
            settings: ListenSettings::default(),
            stop,
            console: Console::new(),
        }
    }

    pub fn with_settings(mut self, settings: ListenSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }
}

#[async_trait]
impl InputChannel for MicrophoneInput {
    async fn listen(&self) -> AgentResult<String> {
        let settings = self.settings.clone();
        let stop = Arc::clone(&self.stop);
        let console = self.console.clone();

        // The cpal stream is tied to the thread that opened it
        let samples = tokio::task::spawn_blocking(move || {
            let mut mic = MicrophoneSource::open()?;
            capture_utterance(&mut mic, &settings, &stop, || console.print_status("Listening..."))
        })
        .await
        .map_err(|e| AgentError::Audio(format!("capture task failed: {}", e)))??;

        tracing::debug!("[Input] Captured {} samples", samples.len());
        self.console.print_status("Recognizing...");

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        self.stt.transcribe(&wav, SAMPLE_RATE).await
    }
}

/// Typed input from the terminal, for machines without a microphone.
/// End of input sets the stop flag.
pub struct ConsoleInput {
    stop: Arc<AtomicBool>,
    console: Console,
}

impl ConsoleInput {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            console: Console::new(),
        }
    }
}

#[async_trait]
impl InputChannel for ConsoleInput {
    async fn listen(&self) -> AgentResult<String> {
        let console = self.console.clone();
        let line = tokio::task::spawn_blocking(move || console.read_input())
            .await
            .map_err(|e| AgentError::other(format!("input task failed: {}", e)))??;

        match line {
            None => {
                self.stop.store(true, Ordering::SeqCst);
                Err(AgentError::RecognitionFailure("end of input".to_string()))
            }
            Some(text) if text.is_empty() => {
                Err(AgentError::RecognitionFailure("empty input".to_string()))
            }
            Some(text) => Ok(text),
        }
    }
}
