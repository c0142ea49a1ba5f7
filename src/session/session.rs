//! Conversation session
//!
//! `ConversationSession` pairs the in-memory transcript with the store that
//! persists it. Every append is written to the store before it becomes
//! visible in memory, so a failed write leaves both views unchanged.

use std::sync::Arc;

use crate::core::AgentResult;
use crate::llm::Message;

use super::metadata::SessionMetadata;
use super::store::SessionStore;
use super::window::HistoryWindow;

/// An open session: metadata, transcript, and the backing store
pub struct ConversationSession {
    /// Session metadata (identity, timestamps, model)
    pub metadata: SessionMetadata,

    messages: Vec<Message>,

    store: Arc<dyn SessionStore>,
}

impl ConversationSession {
    /// Open a session, creating it on first use, and load its transcript
    pub fn open(store: Arc<dyn SessionStore>, metadata: SessionMetadata) -> AgentResult<Self> {
        let metadata = store.ensure_session(&metadata)?;
        let messages = store.load(&metadata.session_id)?;

        tracing::info!(
            "[Session] Opened session {} with {} stored messages",
            metadata.session_id,
            messages.len()
        );

        Ok(Self {
            metadata,
            messages,
            store,
        })
    }

    /// Get the session id
    pub fn id(&self) -> &str {
        &self.metadata.session_id
    }

    /// Full ordered transcript
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages to send to the model under `window`
    pub fn context(&self, window: HistoryWindow) -> &[Message] {
        window.apply(&self.messages)
    }

    /// Number of messages in the transcript
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Persist a message, then add it to the transcript
    pub fn append(&mut self, message: Message) -> AgentResult<()> {
        self.store.append(&self.metadata.session_id, &message)?;
        self.metadata.touch();
        self.messages.push(message);
        Ok(())
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("session_id", &self.metadata.session_id)
            .field("messages", &self.messages.len())
            .field("store", &self.store.describe())
            .finish()
    }
}
