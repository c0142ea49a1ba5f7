//! Application configuration
//!
//! Built once at startup from command-line flags (with `VOICE_AGENT_*`
//! environment fallbacks) plus API keys read from the environment, then
//! passed by reference to whatever needs it.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::agent::{TurnConfig, DEFAULT_MAX_ROUNDS};
use crate::core::{AgentError, AgentResult, RetryPolicy};
use crate::llm::gemini::DEFAULT_MODEL;
use crate::session::HistoryWindow;
use crate::tools::CommandPolicy;
use crate::voice::tts::{DEFAULT_TTS_MODEL, DEFAULT_VOICE};
use crate::voice::ListenSettings;

/// API keys, read from the environment only
#[derive(Clone, Default)]
pub struct Credentials {
    /// `GOOGLE_API_KEY`
    pub google_api_key: Option<String>,
    /// `GEMINI_API_KEY`
    pub gemini_api_key: Option<String>,
    /// `GOOGLE_SPEECH_API_KEY`
    pub speech_api_key: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            google_api_key: non_empty(std::env::var("GOOGLE_API_KEY").ok()),
            gemini_api_key: non_empty(std::env::var("GEMINI_API_KEY").ok()),
            speech_api_key: non_empty(std::env::var("GOOGLE_SPEECH_API_KEY").ok()),
        }
    }

    /// Key for chat completion: `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`
    pub fn chat_key(&self) -> AgentResult<&str> {
        self.google_api_key
            .as_deref()
            .or(self.gemini_api_key.as_deref())
            .ok_or_else(|| {
                AgentError::MissingCredential(
                    "GOOGLE_API_KEY is not set (GEMINI_API_KEY is also accepted)".to_string(),
                )
            })
    }

    /// Key for speech recognition: `GOOGLE_SPEECH_API_KEY`, falling back to the chat key
    pub fn speech_key(&self) -> Option<&str> {
        self.speech_api_key
            .as_deref()
            .or(self.google_api_key.as_deref())
            .or(self.gemini_api_key.as_deref())
    }

    /// Key for speech synthesis: `GEMINI_API_KEY`, falling back to the chat key
    pub fn tts_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .or(self.google_api_key.as_deref())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &self.google_api_key.is_some())
            .field("gemini_api_key", &self.gemini_api_key.is_some())
            .field("speech_api_key", &self.speech_api_key.is_some())
            .finish()
    }
}

/// Voice-driven coding assistant backed by Gemini
#[derive(Parser, Debug, Clone)]
#[command(name = "voice-agent", version, about)]
pub struct AppConfig {
    /// Session identifier; the transcript persists under this id
    #[arg(short, long, env = "VOICE_AGENT_SESSION", default_value = "3")]
    pub session: String,

    /// Session store: a directory, file://<dir>, sqlite://<path> or sqlite::memory:
    #[arg(long, env = "VOICE_AGENT_STORE", default_value = "./sessions")]
    pub store: String,

    /// Chat model
    #[arg(short, long, env = "VOICE_AGENT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// File with a replacement system prompt
    #[arg(long, env = "VOICE_AGENT_SYSTEM_PROMPT")]
    pub system_prompt_file: Option<PathBuf>,

    /// Maximum chat-completion rounds per turn
    #[arg(long, env = "VOICE_AGENT_MAX_ROUNDS", default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,

    /// Send only the last N messages to the model (0 = whole transcript)
    #[arg(long, env = "VOICE_AGENT_HISTORY_LIMIT", default_value_t = 0)]
    pub history_limit: usize,

    /// Only run commands starting with one of these prefixes (repeatable or comma-separated)
    #[arg(long = "allow-command", env = "VOICE_AGENT_ALLOW_COMMANDS", value_delimiter = ',')]
    pub allow_commands: Vec<String>,

    /// Directory commands run in
    #[arg(long, env = "VOICE_AGENT_WORKDIR", default_value = ".")]
    pub working_dir: PathBuf,

    /// Per-command timeout in seconds
    #[arg(long, env = "VOICE_AGENT_COMMAND_TIMEOUT", default_value_t = 120)]
    pub command_timeout_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "VOICE_AGENT_HTTP_TIMEOUT", default_value_t = 60)]
    pub http_timeout_secs: u64,

    /// Attempts per remote call, including the first
    #[arg(long, env = "VOICE_AGENT_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Speech recognition language (BCP-47)
    #[arg(long, env = "VOICE_AGENT_LANGUAGE", default_value = "en-US")]
    pub language: String,

    /// Silence that ends an utterance, in milliseconds
    #[arg(long, env = "VOICE_AGENT_PAUSE_MS", default_value_t = 800)]
    pub pause_ms: u64,

    /// Longest utterance, in seconds
    #[arg(long, env = "VOICE_AGENT_PHRASE_LIMIT", default_value_t = 30)]
    pub phrase_limit_secs: u64,

    /// Type instead of speaking
    #[arg(long)]
    pub text: bool,

    /// Speech synthesis model
    #[arg(long, env = "VOICE_AGENT_TTS_MODEL", default_value = DEFAULT_TTS_MODEL)]
    pub tts_model: String,

    /// Prebuilt voice for speech synthesis
    #[arg(long, env = "VOICE_AGENT_TTS_VOICE", default_value = DEFAULT_VOICE)]
    pub tts_voice: String,

    /// Where the spoken reply is written
    #[arg(long, env = "VOICE_AGENT_OUTPUT", default_value = crate::voice::DEFAULT_OUTPUT_PATH)]
    pub output_path: PathBuf,

    /// Disable speech synthesis
    #[arg(long, env = "VOICE_AGENT_NO_TTS")]
    pub no_tts: bool,

    /// Directory for log files
    #[arg(long, env = "VOICE_AGENT_LOG_DIR", default_value = "./logs")]
    pub log_dir: PathBuf,

    /// Write log files as JSON lines
    #[arg(long, env = "VOICE_AGENT_LOG_JSON")]
    pub log_json: bool,

    /// Increase console log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(skip)]
    pub credentials: Credentials,
}

impl AppConfig {
    /// Parse flags and read credentials from the environment
    pub fn from_args() -> Self {
        let mut config = Self::parse();
        config.credentials = Credentials::from_env();
        config
    }

    /// Reject configurations that cannot start
    pub fn validate(&self) -> AgentResult<()> {
        self.credentials.chat_key()?;

        if self.session.trim().is_empty() {
            return Err(AgentError::Config("session id must not be empty".to_string()));
        }
        if self.max_rounds == 0 {
            return Err(AgentError::Config("--max-rounds must be at least 1".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(AgentError::Config("--retry-attempts must be at least 1".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(AgentError::Config("--http-timeout must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn history_window(&self) -> HistoryWindow {
        HistoryWindow::from_limit(self.history_limit)
    }

    pub fn command_policy(&self) -> CommandPolicy {
        CommandPolicy::allow_prefixes(self.allow_commands.iter().cloned())
    }

    pub fn listen_settings(&self) -> ListenSettings {
        ListenSettings {
            pause: Duration::from_millis(self.pause_ms),
            phrase_limit: Duration::from_secs(self.phrase_limit_secs),
            ..ListenSettings::default()
        }
    }

    /// Turn settings with the given system prompt
    pub fn turn_config(&self, system_prompt: String) -> TurnConfig {
        TurnConfig::new(system_prompt)
            .with_max_rounds(self.max_rounds)
            .with_history_window(self.history_window())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["voice-agent"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    fn with_chat_key(mut config: AppConfig) -> AppConfig {
        config.credentials.google_api_key = Some("k".into());
        config
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.session, "3");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_rounds, 25);
        assert_eq!(config.history_window(), HistoryWindow::Unbounded);
        assert!(config.command_policy().is_open());
        assert_eq!(config.output_path, PathBuf::from("./ai_generated/tts_output.wav"));
        assert_eq!(config.tts_voice, "Callirhoe");
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.listen_settings().pause, Duration::from_millis(800));
    }

    #[test]
    fn test_missing_chat_key_is_fatal() {
        let config = parse(&[]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AgentError::MissingCredential(_)));
        assert!(err.is_fatal());

        assert!(with_chat_key(parse(&[])).validate().is_ok());
    }

    #[test]
    fn test_key_fallbacks() {
        let creds = Credentials {
            gemini_api_key: Some("gem".into()),
            ..Credentials::default()
        };
        assert_eq!(creds.chat_key().unwrap(), "gem");
        assert_eq!(creds.speech_key(), Some("gem"));
        assert_eq!(creds.tts_key(), Some("gem"));

        let creds = Credentials {
            google_api_key: Some("goo".into()),
            speech_api_key: Some("sp".into()),
            ..Credentials::default()
        };
        assert_eq!(creds.chat_key().unwrap(), "goo");
        assert_eq!(creds.speech_key(), Some("sp"));
        assert_eq!(creds.tts_key(), Some("goo"));
    }

    #[test]
    fn test_allow_list_and_window_flags() {
        let config = parse(&["--allow-command", "ls,git status", "--history-limit", "40"]);
        let policy = config.command_policy();
        assert!(policy.allows("git status -s"));
        assert!(!policy.allows("rm -rf ."));
        assert_eq!(config.history_window(), HistoryWindow::LastMessages(40));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let config = with_chat_key(parse(&["--max-rounds", "0"]));
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_debug_hides_keys() {
        let config = with_chat_key(parse(&[]));
        let dump = format!("{:?}", config);
        assert!(!dump.contains("\"k\""));
    }
}
