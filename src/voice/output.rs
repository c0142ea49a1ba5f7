//! Output channels: what happens to the final reply

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::tts::TextToSpeech;
use crate::core::{AgentError, AgentResult};

/// Default location of the synthesized reply
pub const DEFAULT_OUTPUT_PATH: &str = "./ai_generated/tts_output.wav";

/// Delivers the final assistant reply
#[async_trait]
pub trait OutputChannel: Send + Sync {
    /// Deliver `text`. Failures are [`AgentError::SynthesisFailure`].
    async fn speak(&self, text: &str) -> AgentResult<()>;

    /// File the reply is written to, if any
    fn destination(&self) -> Option<&Path> {
        None
    }
}

/// Synthesizes the reply and writes it to a fixed WAV file
pub struct SpeechOutput {
    tts: Arc<dyn TextToSpeech>,
    path: PathBuf,
}

impl SpeechOutput {
    pub fn new(tts: Arc<dyn TextToSpeech>, path: impl Into<PathBuf>) -> Self {
        Self {
            tts,
            path: path.into(),
        }
    }
}

#[async_trait]
impl OutputChannel for SpeechOutput {
    async fn speak(&self, text: &str) -> AgentResult<()> {
        if text.trim().is_empty() {
            tracing::debug!("[Output] Empty reply, nothing to synthesize");
            return Ok(());
        }

        let audio = self.tts.synthesize(text).await.map_err(|e| match e {
            AgentError::SynthesisFailure(_) => e,
            other => AgentError::SynthesisFailure(other.to_string()),
        })?;

        write_atomic(&self.path, &audio)
            .map_err(|e| AgentError::SynthesisFailure(format!("writing {}: {}", self.path.display(), e)))?;

        tracing::info!("[Output] Wrote {} bytes to {}", audio.len(), self.path.display());
        Ok(())
    }

    fn destination(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Output used when speech synthesis is not configured
pub struct SilentOutput;

#[async_trait]
impl OutputChannel for SilentOutput {
    async fn speak(&self, _text: &str) -> AgentResult<()> {
        Ok(())
    }
}

/// Write through a temp file in the target directory, then rename over the
/// target, so readers never see a partial file
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeTts {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextToSpeech for FakeTts {
        async fn synthesize(&self, text: &str) -> AgentResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AgentError::Remote {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    fn output(dir: &TempDir, fail: bool) -> (SpeechOutput, Arc<FakeTts>) {
        let tts = Arc::new(FakeTts {
            fail,
            calls: AtomicUsize::new(0),
        });
        let path = dir.path().join("ai_generated").join("tts_output.wav");
        (SpeechOutput::new(tts.clone(), path), tts)
    }

    #[tokio::test]
    async fn test_speak_creates_dir_and_file() {
        let dir = TempDir::new().unwrap();
        let (out, _) = output(&dir, false);

        out.speak("hello").await.unwrap();
        let written = fs::read(out.destination().unwrap()).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn test_speak_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let (out, _) = output(&dir, false);

        out.speak("first reply").await.unwrap();
        out.speak("second").await.unwrap();
        assert_eq!(fs::read(out.destination().unwrap()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_failure_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let (good, _) = output(&dir, false);
        good.speak("keep me").await.unwrap();

        let (bad, _) = output(&dir, true);
        let err = bad.speak("replace me").await.unwrap_err();
        assert!(matches!(err, AgentError::SynthesisFailure(_)));
        assert_eq!(fs::read(bad.destination().unwrap()).unwrap(), b"keep me");

        // No stray temp files left behind
        let entries = fs::read_dir(dir.path().join("ai_generated")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_noop() {
        let dir = TempDir::new().unwrap();
        let (out, tts) = output(&dir, false);

        out.speak("   ").await.unwrap();
        assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
        assert!(!out.destination().unwrap().exists());
    }
}
