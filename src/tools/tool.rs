//! The `Tool` trait and what a tool hands back

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentResult;
use crate::llm::{Message, ToolCall, ToolDefinition};

/// Text returned to the model after a tool runs.
///
/// `is_error` marks results the model should read as a failure to act
/// (unknown tool, bad arguments, denied command). A command that ran and
/// exited non-zero is not an error here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
        }
    }

    /// The `tool` message answering `call`
    pub fn into_message(self, call: &ToolCall) -> Message {
        Message::tool_result(call, self.output, self.is_error)
    }
}

/// An action the model can request by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Declaration sent to the chat model
    fn definition(&self) -> ToolDefinition;

    /// Run with a JSON object matching the declared schema.
    ///
    /// Bad input is reported as an error [`ToolResult`], not as `Err`.
    async fn execute(&self, input: &Value) -> AgentResult<ToolResult>;
}
