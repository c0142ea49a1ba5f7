//! Agent error types

use thiserror::Error;

/// Errors that can occur in the voice agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Audio was captured but could not be understood
    #[error("Speech not recognized: {0}")]
    RecognitionFailure(String),

    /// The remote speech-to-text service could not be reached
    #[error("Speech service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Text-to-speech synthesis or writing the audio file failed
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailure(String),

    /// The model asked for more than one tool in a single reply
    #[error("Model requested {count} tool calls in one reply, at most one is allowed")]
    MultipleToolCalls {
        /// Number of tool calls in the offending reply
        count: usize,
    },

    /// A turn needed more chat-completion rounds than allowed
    #[error("Tool loop limit exceeded after {limit} rounds")]
    ToolLoopLimitExceeded {
        /// Configured round limit
        limit: usize,
    },

    /// A required credential is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Chat-completion API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Remote API answered with a non-success status
    #[error("Remote service returned {status}: {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Audio device error
    #[error("Audio error: {0}")]
    Audio(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite store error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        AgentError::Other(msg.into())
    }

    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        AgentError::Llm(msg.into())
    }

    /// Errors that must stop the session loop instead of being logged
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::MultipleToolCalls { .. } | AgentError::MissingCredential(_)
        )
    }

    /// Errors worth retrying at an external-interface boundary
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::ServiceUnavailable(_) => true,
            AgentError::Remote { status, .. } => is_transient_status(*status),
            AgentError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map(|s| is_transient_status(s.as_u16())).unwrap_or(false)
            }
            _ => false,
        }
    }
}

/// Rate limits and server errors are transient; everything else is not
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::SessionNotFound("abc123".into());
        assert_eq!(err.to_string(), "Session not found: abc123");

        let err = AgentError::MultipleToolCalls { count: 2 };
        assert_eq!(
            err.to_string(),
            "Model requested 2 tool calls in one reply, at most one is allowed"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let agent_err: AgentError = io_err.into();
        assert!(matches!(agent_err, AgentError::Io(_)));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::MultipleToolCalls { count: 3 }.is_fatal());
        assert!(AgentError::MissingCredential("GOOGLE_API_KEY".into()).is_fatal());
        assert!(!AgentError::RecognitionFailure("noise".into()).is_fatal());
        assert!(!AgentError::ToolLoopLimitExceeded { limit: 5 }.is_fatal());
        assert!(!AgentError::SynthesisFailure("boom".into()).is_fatal());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::ServiceUnavailable("down".into()).is_retryable());
        assert!(!AgentError::RecognitionFailure("noise".into()).is_retryable());
        assert!(!AgentError::llm("bad request").is_retryable());
        assert!(AgentError::Remote { status: 503, message: "busy".into() }.is_retryable());
        assert!(!AgentError::Remote { status: 400, message: "bad".into() }.is_retryable());
    }

    #[test]
    fn test_transient_status() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(200));
    }
}
