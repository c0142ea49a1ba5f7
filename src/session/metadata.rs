//! Session metadata types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a conversation session
///
/// This is persisted separately from the message history for quick access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session identifier chosen by the operator
    pub session_id: String,

    /// Model used for the most recent turns
    #[serde(default)]
    pub model: String,

    /// Provider (e.g., "gemini")
    #[serde(default)]
    pub provider: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session was last updated
    pub updated_at: DateTime<Utc>,
}

impl SessionMetadata {
    /// Create new metadata with both timestamps set to now
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            model: String::new(),
            provider: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the LLM configuration
    pub fn with_model(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model = model.into();
        self.provider = provider.into();
        self
    }

    /// Update the `updated_at` timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
