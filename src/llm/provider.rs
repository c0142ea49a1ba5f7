//! LLM Provider trait
//!
//! Abstracts the chat-completion capability so the turn processor can run
//! against Gemini in production and against scripted stubs in tests.

use async_trait::async_trait;

use super::types::{ChatResponse, Message, ToolDefinition};
use crate::core::AgentResult;

/// Trait for chat-completion providers.
///
/// All providers work with the crate's own message types; providers that use a
/// different wire format handle translation internally.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Produce the next reply for the ordered transcript.
    ///
    /// `messages` is the full context for this call (system prompt excluded),
    /// `tools` the declared tool set.
    async fn complete(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> AgentResult<ChatResponse>;

    /// Get the current model name.
    fn model(&self) -> String;

    /// Get the provider name (e.g., "gemini").
    fn provider_name(&self) -> &str;
}
